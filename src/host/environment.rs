// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host environment collaborator: environment variables, special folders and
//! platform identity

use crate::model::CaseInsensitiveMap;
use std::path::PathBuf;

/// Environment queries answered by the host
pub trait HostEnvironment: Send + Sync + std::fmt::Debug {
    /// Value of an environment variable
    fn var(&self, name: &str) -> Option<String>;

    /// All environment variables
    fn vars(&self) -> Vec<(String, String)>;

    /// Location of a special folder (`ApplicationData`, `UserProfile`, ...)
    fn special_folder(&self, name: &str) -> Option<PathBuf>;

    /// Platform name: `Windows`, `Linux`, `OSX` or `FreeBSD`
    fn platform(&self) -> &str;
}

/// Environment of the running process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl HostEnvironment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn special_folder(&self, name: &str) -> Option<PathBuf> {
        let env_path = |var: &str| std::env::var_os(var).map(PathBuf::from);
        match name.to_ascii_lowercase().as_str() {
            "applicationdata" => dirs::config_dir(),
            "localapplicationdata" => dirs::data_local_dir(),
            "userprofile" => dirs::home_dir(),
            "personal" | "mydocuments" => dirs::document_dir(),
            "desktop" | "desktopdirectory" => dirs::desktop_dir(),
            "programfiles" => env_path("ProgramFiles"),
            "programfilesx86" => env_path("ProgramFiles(x86)"),
            "commonapplicationdata" => env_path("ProgramData"),
            "windows" => env_path("windir"),
            "system" => env_path("windir").map(|dir| dir.join("System32")),
            _ => None,
        }
    }

    fn platform(&self) -> &str {
        current_platform()
    }
}

/// Platform name of the compilation target
pub fn current_platform() -> &'static str {
    if cfg!(windows) {
        "Windows"
    } else if cfg!(target_os = "macos") {
        "OSX"
    } else if cfg!(target_os = "freebsd") {
        "FreeBSD"
    } else {
        "Linux"
    }
}

/// Fixed environment, for tests and sandboxed evaluation
#[derive(Debug, Clone)]
pub struct MapEnvironment {
    vars: CaseInsensitiveMap<String>,
    folders: CaseInsensitiveMap<PathBuf>,
    platform: String,
}

impl Default for MapEnvironment {
    fn default() -> Self {
        Self {
            vars: CaseInsensitiveMap::new(),
            folders: CaseInsensitiveMap::new(),
            platform: current_platform().to_string(),
        }
    }
}

impl MapEnvironment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a variable
    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name, value.to_string());
        self
    }

    /// Builder: add a special folder
    pub fn with_folder(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.folders.insert(name, path.into());
        self
    }

    /// Builder: override the platform name
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }
}

impl HostEnvironment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn special_folder(&self, name: &str) -> Option<PathBuf> {
        self.folders.get(name).cloned()
    }

    fn platform(&self) -> &str {
        &self.platform
    }
}
