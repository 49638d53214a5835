#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    ffi::{OsStr, OsString},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use grars_setup::{
    inst::InstallConfig,
    manifest::{AppId, DEFAULT_APP_ID},
    net::{FetchError, Fetcher},
    os::{AccessScope, Interrupt},
    path::{PathResolver, Platform},
    prereq::{CommandOutput, CommandRunner},
};

/// Config for a per-user Linux installation below `home`.
pub fn config(home: &Path) -> InstallConfig {
    let env_map: HashMap<OsString, OsString> =
        HashMap::from_iter([("HOME".into(), home.as_os_str().to_os_string())]);
    let resolver =
        PathResolver::with_env_map("grars", Platform::Linux, AccessScope::User, env_map).unwrap();
    let app_id = AppId::new(DEFAULT_APP_ID).unwrap();

    let mut config = InstallConfig::new(&app_id, resolver);
    config.modify_os_search_path = false;
    config.flags.assume_yes = true;
    config
}

pub fn write_executable(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Serves every URL with a body derived from the URL.
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Fetcher for FakeFetcher {
    fn latest_release_tag(&self, repo: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(format!("release {repo}"));
        Ok("v0.9.0".to_string())
    }

    fn download(&self, url: &str, output: &mut dyn Write) -> Result<u64, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        serve(url, output)
    }
}

fn serve(url: &str, output: &mut dyn Write) -> Result<u64, FetchError> {
    let body = if url.ends_with(".json") {
        "{\"audio\": {\"sample_rate\": 22050}}\n".to_string()
    } else {
        format!("#!/bin/sh\n# {url}\n")
    };
    output.write_all(body.as_bytes())?;

    Ok(body.len() as u64)
}

/// Scripted answer to one request of a [`ScriptedFetcher`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// Responds with an HTTP error status.
    Status(u16),
    /// Raises the interrupt, then starts writing the body.
    RaiseInterrupt(Interrupt),
}

/// Like [`FakeFetcher`], but URLs can be given replies that are used up in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    pub inner: FakeFetcher,
    pub replies: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
}

impl ScriptedFetcher {
    pub fn reply(&self, url: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn count(&self, url: &str) -> usize {
        self.inner
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| *request == url)
            .count()
    }
}

impl Fetcher for ScriptedFetcher {
    fn latest_release_tag(&self, repo: &str) -> Result<String, FetchError> {
        self.inner.latest_release_tag(repo)
    }

    fn download(&self, url: &str, output: &mut dyn Write) -> Result<u64, FetchError> {
        self.inner.requests.lock().unwrap().push(url.to_string());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Status(code)) => Err(FetchError::Status(code)),
            Some(Reply::RaiseInterrupt(interrupt)) => {
                interrupt.raise();
                serve(url, output)
            }
            None => serve(url, output),
        }
    }
}

/// Pretends `python3` exists and that `python -m venv` creates an environment.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    pub calls: Arc<Mutex<Vec<Vec<OsString>>>>,
}

impl FakeRunner {
    pub fn venv_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.get(2).map(|arg| arg == "venv").unwrap_or(false))
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> std::io::Result<CommandOutput> {
        let mut call = vec![program.as_os_str().to_os_string()];
        call.extend(args.iter().map(|arg| arg.to_os_string()));
        self.calls.lock().unwrap().push(call);

        if let [module_flag, module, venv_dir] = args {
            if *module_flag == "-m" && *module == "venv" {
                let bin = PathBuf::from(venv_dir).join("bin");
                write_executable(&bin.join("python"), "#!/bin/sh\n");
                write_executable(&bin.join("piper"), "#!/bin/sh\n");
            }
        }

        Ok(CommandOutput {
            status_code: Some(0),
            ..Default::default()
        })
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        (name == "python3").then(|| PathBuf::from("/usr/bin/python3"))
    }
}
