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

//! `Microsoft.Win32.Registry` and the registry lookups shared with the
//! `$(registry:KEY@VALUE)` form

use crate::error::Result;
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_str};

/// `Microsoft.Win32.Registry`
pub struct RegistryClass;

impl ClassSource for RegistryClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![("GetValue", FunctionImpl::asynchronous(get_value))]
    }
}

/// Read `value_name` under `key` in `view`. A missing key or value, or a
/// store failure, reads as `None`.
pub async fn registry_value(
    host: &Host,
    key: &str,
    value_name: &str,
    view: &str,
) -> Option<String> {
    let entry = host.store.get(key, view).await?;
    let value = entry.values.get(value_name).cloned();
    if value.is_none() {
        log::debug!("registry value {key}@{value_name} not found");
    }
    value
}

/// `GetValue(key, name, default)`
async fn get_value(args: Vec<Value>, host: Host) -> Result<Value> {
    let view = host.registry_view.clone();
    let value = registry_value(&host, &arg_str(&args, 0), &arg_str(&args, 1), &view).await;
    Ok(match value {
        Some(value) => Value::String(value),
        None => args.get(2).cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryFileSystem, MemoryKeyValueStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_value_with_default() {
        let host = Host::in_memory(Arc::new(MemoryFileSystem::new())).with_store(Arc::new(
            MemoryKeyValueStore::new().with_value("HKLM\\SOFTWARE\\Kit", "Root", "C:\\Kit"),
        ));

        let found = get_value(
            vec![Value::string("HKEY_LOCAL_MACHINE\\SOFTWARE\\Kit"), Value::string("Root")],
            host.clone(),
        )
        .await
        .unwrap();
        assert_eq!(found, Value::string("C:\\Kit"));

        let missing = get_value(
            vec![
                Value::string("HKLM\\SOFTWARE\\Kit"),
                Value::string("Other"),
                Value::string("fallback"),
            ],
            host,
        )
        .await
        .unwrap();
        assert_eq!(missing, Value::string("fallback"));
    }
}
