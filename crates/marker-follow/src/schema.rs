//! Property descriptors for a settings editor.
//!
//! Keys match the serde field names of [`ControllerSettings`](crate::ControllerSettings).

use marker_follow_aruco::BUILTIN_DICTIONARIES;
use marker_follow_scene::{NodeKind, SceneHost, SceneItem};
use serde::Serialize;
use std::ops::ControlFlow;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    List { choices: Vec<Choice> },
    Int { min: i64, max: i64, step: i64 },
    Bool,
    FloatSlider { min: f64, max: f64, step: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Property {
    pub key: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: PropertyKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropertyGroup {
    pub key: &'static str,
    pub label: &'static str,
    pub properties: Vec<Property>,
}

impl PropertyGroup {
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key == key)
    }
}

/// Nodes of the current scene that can be chosen as target, led by "None".
///
/// Filters are skipped, as are placements without an id or a name.
pub fn target_choices<H: SceneHost + ?Sized>(host: &H) -> Vec<Choice> {
    let mut choices = vec![Choice {
        label: "None".to_string(),
        value: String::new(),
    }];
    if let Some(scene) = host.current_scene() {
        host.enum_scene_items(&scene, &mut |item: &SceneItem| {
            if item.kind != NodeKind::Filter && !item.name.is_empty() && !item.node.as_str().is_empty() {
                choices.push(Choice {
                    label: item.name.clone(),
                    value: item.node.as_str().to_string(),
                });
            }
            ControlFlow::Continue(())
        });
    }
    choices
}

/// Grouped settings properties, with target choices from the current scene.
pub fn settings_schema<H: SceneHost + ?Sized>(host: &H) -> Vec<PropertyGroup> {
    let dictionaries = BUILTIN_DICTIONARIES
        .iter()
        .map(|d| Choice {
            label: d.name.to_string(),
            value: d.name.to_string(),
        })
        .collect();
    let spaces = [("Host relative", "host_relative"), ("Scene", "scene")]
        .into_iter()
        .map(|(label, value)| Choice {
            label: label.to_string(),
            value: value.to_string(),
        })
        .collect();

    vec![
        PropertyGroup {
            key: "general_group",
            label: "General",
            properties: vec![Property {
                key: "target_node",
                label: "Source",
                kind: PropertyKind::List {
                    choices: target_choices(host),
                },
            }],
        },
        PropertyGroup {
            key: "marker_group",
            label: "Marker Settings",
            properties: vec![
                Property {
                    key: "dictionary",
                    label: "Dictionary",
                    kind: PropertyKind::List {
                        choices: dictionaries,
                    },
                },
                Property {
                    key: "marker_id",
                    label: "Marker ID",
                    kind: PropertyKind::Int {
                        min: 0,
                        max: 49,
                        step: 1,
                    },
                },
                Property {
                    key: "hide_when_absent",
                    label: "Show source only when the marker is detected",
                    kind: PropertyKind::Bool,
                },
                Property {
                    key: "skip_frames",
                    label: "Skip Frames",
                    kind: PropertyKind::Int {
                        min: 0,
                        max: 60,
                        step: 1,
                    },
                },
            ],
        },
        PropertyGroup {
            key: "scaling_group",
            label: "Scaling Settings",
            properties: vec![
                Property {
                    key: "scaling_bias",
                    label: "Scaling Factor",
                    kind: PropertyKind::FloatSlider {
                        min: -1.0,
                        max: 1.0,
                        step: 0.01,
                    },
                },
                Property {
                    key: "coordinate_space",
                    label: "Coordinates",
                    kind: PropertyKind::List { choices: spaces },
                },
            ],
        },
    ]
}
