#![allow(dead_code)]

use context7_kb::repository::CommandRunner;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Stand-in for git: clones create a `.git` directory, pulls return a scripted result
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    pub pull_succeeds: bool,
    pub clone_fails: bool,
    pub unavailable: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn working() -> Self {
        Self {
            pull_succeeds: true,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|args| if args[0] == "-C" { args[2].clone() } else { args[0].clone() })
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: Vec<OsString>) -> anyhow::Result<bool> {
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls.lock().unwrap().push(args.clone());

        if self.unavailable {
            anyhow::bail!("git: command not found");
        }

        match args[0].as_str() {
            "clone" => {
                let target = PathBuf::from(args.last().unwrap());
                if self.clone_fails {
                    // git leaves an empty directory behind when a clone dies early
                    fs::create_dir_all(&target)?;
                    return Ok(false);
                }
                fs::create_dir_all(target.join(".git"))?;
                fs::write(target.join("README.md"), "cloned")?;
                Ok(true)
            }
            "-C" => Ok(self.pull_succeeds),
            _ => Ok(false),
        }
    }
}

pub const DOC_WITH_SOURCE: &str = "# FastAPI\n\nSOURCE: https://github.com/tiangolo/fastapi.git\n\nFastAPI framework, high performance.\n";
