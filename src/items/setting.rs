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

//! Edit-back of property and item-definition settings

use super::Items;
use crate::evaluator::PropertyContext;
use crate::model::Element;
use std::sync::Arc;

/// What a setting applies to
#[derive(Debug)]
pub enum SettingTarget<'a> {
    /// A project-level property
    Global(&'a mut PropertyContext),
    /// Item-definition metadata of one item type
    Item(&'a mut Items),
}

/// Set (or with `revert`, remove) `name` under the group matching
/// `condition`.
///
/// Global properties live in a `PropertyGroup`, item settings in an
/// `ItemDefinitionGroup`; a group with the exact condition is reused or
/// created. The in-memory state is updated to match. Returns the element
/// holding the value, or the removed element when reverting.
pub fn add_setting(
    project: &mut Element,
    target: SettingTarget<'_>,
    name: &str,
    value: &str,
    condition: &str,
    revert: bool,
) -> Option<Arc<Element>> {
    let condition = condition.trim();
    match target {
        SettingTarget::Global(properties) => {
            let group = find_or_create(project, "PropertyGroup", condition, !revert)?;
            let origin = set_child_value(group, name, value, revert);
            if revert {
                properties.remove(name);
            } else {
                properties.inject(name, value);
            }
            origin
        }
        SettingTarget::Item(items) => {
            let group = find_or_create(project, "ItemDefinitionGroup", condition, !revert)?;
            let item_index = match group.position(|child| child.is(items.name())) {
                Some(index) => index,
                None if revert => return None,
                None => {
                    group.push_child(Element::new(items.name()));
                    group.children().len() - 1
                }
            };
            let definition = group.child_mut(item_index)?;
            let origin = set_child_value(definition, name, value, revert);
            let template = group.children().get(item_index)?.clone();
            items.definition_for(condition, true).template = template;
            origin
        }
    }
}

/// The child group of `project` named `group_name` whose condition is
/// exactly `condition`
fn find_or_create<'a>(
    project: &'a mut Element,
    group_name: &str,
    condition: &str,
    create: bool,
) -> Option<&'a mut Element> {
    let index = match project
        .position(|child| child.is(group_name) && child.condition().trim() == condition)
    {
        Some(index) => index,
        None if !create => return None,
        None => {
            let mut group = Element::new(group_name);
            if !condition.is_empty() {
                group.set_attribute("Condition", condition);
            }
            project.push_child(group);
            project.children().len() - 1
        }
    };
    project.child_mut(index)
}

fn set_child_value(
    parent: &mut Element,
    name: &str,
    value: &str,
    revert: bool,
) -> Option<Arc<Element>> {
    if revert {
        return parent.remove_children(|child| child.is(name)).pop();
    }
    match parent.position(|child| child.is(name)) {
        Some(index) => {
            parent.child_mut(index)?.set_text(value);
            parent.children().get(index).cloned()
        }
        None => Some(parent.push_child(Element::new(name).with_text(value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemKind;
    use pretty_assertions::assert_eq;

    const DEBUG: &str = "'$(Configuration)' == 'Debug'";

    #[test]
    fn test_global_setting_reuses_group() {
        let mut project = Element::new("Project").with_child(
            Element::new("PropertyGroup")
                .with_attribute("Condition", DEBUG)
                .with_child(Element::new("Optimize").with_text("true")),
        );
        let mut properties = PropertyContext::new();

        let origin = add_setting(
            &mut project,
            SettingTarget::Global(&mut properties),
            "Optimize",
            "false",
            DEBUG,
            false,
        )
        .unwrap();
        assert_eq!(origin.text(), "false");
        assert_eq!(project.children().len(), 1);
        assert_eq!(project.children()[0].children()[0].text(), "false");
        assert_eq!(properties.get("Optimize"), Some("false"));

        add_setting(
            &mut project,
            SettingTarget::Global(&mut properties),
            "Optimize",
            "",
            DEBUG,
            true,
        );
        assert!(project.children()[0].children().is_empty());
        assert_eq!(properties.get("Optimize"), None);
    }

    #[test]
    fn test_item_setting_creates_definition() {
        let mut project = Element::new("Project");
        let mut items = Items::new("Compile", ItemKind::File);

        let origin = add_setting(
            &mut project,
            SettingTarget::Item(&mut items),
            "Nullable",
            "enable",
            "",
            false,
        )
        .unwrap();
        assert_eq!(origin.name(), "Nullable");

        let group = &project.children()[0];
        assert!(group.is("ItemDefinitionGroup"));
        assert_eq!(group.children()[0].name(), "Compile");
        assert_eq!(items.definitions().len(), 1);
        assert_eq!(items.definitions()[0].template.children()[0].text(), "enable");

        let reverted = add_setting(
            &mut project,
            SettingTarget::Item(&mut items),
            "Nullable",
            "",
            "",
            true,
        );
        assert_eq!(reverted.map(|e| e.text().to_string()), Some("enable".to_string()));
        assert!(items.definitions()[0].template.children().is_empty());
    }

    #[test]
    fn test_revert_without_group_is_noop() {
        let mut project = Element::new("Project");
        let mut properties = PropertyContext::new();
        let result = add_setting(
            &mut project,
            SettingTarget::Global(&mut properties),
            "X",
            "",
            "",
            true,
        );
        assert!(result.is_none());
        assert!(project.children().is_empty());
    }
}
