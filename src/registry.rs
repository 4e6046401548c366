// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 kaflow contributors

//! Component type registry
//!
//! Maps the `type` string of a pipeline entry to a [`TypeDescriptor`]. A
//! descriptor carries the concrete behaviour of the type and its declared
//! ancestor chain, which drives defaults inheritance.

use std::collections::HashMap;
use std::fmt;

use crate::components::Component;
use crate::errors::{KaflowError, KaflowResult};

/// Expands one component into the concrete components it stands for
pub type InflateFn = fn(Component) -> KaflowResult<Vec<Component>>;

/// Concrete behaviour backing a component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    HelmApp,
    StreamsApp,
    ProducerApp,
    KafkaSinkConnector,
    KafkaSourceConnector,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelmApp => write!(f, "helm-app"),
            Self::StreamsApp => write!(f, "streams-app"),
            Self::ProducerApp => write!(f, "producer-app"),
            Self::KafkaSinkConnector => write!(f, "kafka-sink-connector"),
            Self::KafkaSourceConnector => write!(f, "kafka-source-connector"),
        }
    }
}

/// Registered component type
#[derive(Clone)]
pub struct TypeDescriptor {
    /// Type tag used in pipeline and defaults files
    pub type_name: String,
    /// Ancestors from most to least specific, excluding the type itself
    pub ancestors: Vec<String>,
    /// Concrete behaviour, `None` for abstract types
    pub kind: Option<ComponentKind>,
    /// Custom expansion, identity when `None`
    pub inflate: Option<InflateFn>,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("ancestors", &self.ancestors)
            .field("kind", &self.kind)
            .field("inflate", &self.inflate.is_some())
            .finish()
    }
}

impl TypeDescriptor {
    fn builtin(type_name: &str, ancestors: &[&str], kind: Option<ComponentKind>) -> Self {
        Self {
            type_name: type_name.to_string(),
            ancestors: ancestors.iter().map(|a| a.to_string()).collect(),
            kind,
            inflate: None,
        }
    }

    /// The type followed by its ancestors
    pub fn chain(&self) -> Vec<String> {
        let mut chain = Vec::with_capacity(self.ancestors.len() + 1);
        chain.push(self.type_name.clone());
        for ancestor in &self.ancestors {
            if !chain.contains(ancestor) {
                chain.push(ancestor.clone());
            }
        }
        chain
    }

    /// Whether components of this type can be built
    pub fn is_abstract(&self) -> bool {
        self.kind.is_none()
    }
}

/// Registry of all known component types
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: HashMap<String, TypeDescriptor>,
}

const BASE: &str = "base-defaults-component";
const PIPELINE_COMPONENT: &str = "pipeline-component";
const KUBERNETES_APP: &str = "kubernetes-app";
const HELM_APP: &str = "helm-app";
const KAFKA_APP: &str = "kafka-app";
const STREAMS_BOOTSTRAP: &str = "streams-bootstrap";
const KAFKA_CONNECTOR: &str = "kafka-connector";

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in component types
    pub fn builtin() -> Self {
        let streams_chain = [
            KAFKA_APP,
            STREAMS_BOOTSTRAP,
            HELM_APP,
            KUBERNETES_APP,
            PIPELINE_COMPONENT,
            BASE,
        ];
        let connector_chain = [KAFKA_CONNECTOR, PIPELINE_COMPONENT, BASE];

        let descriptors = vec![
            TypeDescriptor::builtin(BASE, &[], None),
            TypeDescriptor::builtin(PIPELINE_COMPONENT, &[BASE], None),
            TypeDescriptor::builtin(KUBERNETES_APP, &[PIPELINE_COMPONENT, BASE], None),
            TypeDescriptor::builtin(
                HELM_APP,
                &[KUBERNETES_APP, PIPELINE_COMPONENT, BASE],
                Some(ComponentKind::HelmApp),
            ),
            TypeDescriptor::builtin(KAFKA_APP, &[PIPELINE_COMPONENT, BASE], None),
            TypeDescriptor::builtin(
                STREAMS_BOOTSTRAP,
                &[HELM_APP, KUBERNETES_APP, PIPELINE_COMPONENT, BASE],
                None,
            ),
            TypeDescriptor::builtin(
                "streams-app",
                &streams_chain,
                Some(ComponentKind::StreamsApp),
            ),
            TypeDescriptor::builtin(
                "producer-app",
                &streams_chain,
                Some(ComponentKind::ProducerApp),
            ),
            TypeDescriptor::builtin(KAFKA_CONNECTOR, &[PIPELINE_COMPONENT, BASE], None),
            TypeDescriptor::builtin(
                "kafka-sink-connector",
                &connector_chain,
                Some(ComponentKind::KafkaSinkConnector),
            ),
            TypeDescriptor::builtin(
                "kafka-source-connector",
                &connector_chain,
                Some(ComponentKind::KafkaSourceConnector),
            ),
        ];

        let mut registry = Self::new();
        for descriptor in descriptors {
            registry
                .types
                .insert(descriptor.type_name.clone(), descriptor);
        }
        registry
    }

    /// Register a descriptor, rejecting duplicate type names
    pub fn register(&mut self, descriptor: TypeDescriptor) -> KaflowResult<()> {
        if self.types.contains_key(&descriptor.type_name) {
            return Err(KaflowError::validation(format!(
                "component type '{}' is already registered",
                descriptor.type_name
            )));
        }

        for ancestor in &descriptor.ancestors {
            if !self.types.contains_key(ancestor) {
                return Err(KaflowError::ClassNotFound {
                    component_type: ancestor.clone(),
                });
            }
        }

        tracing::debug!("Registered component type '{}'", descriptor.type_name);
        self.types
            .insert(descriptor.type_name.clone(), descriptor);
        Ok(())
    }

    /// Register a type derived from existing ones
    ///
    /// The ancestor chain is the concatenation of the parents' chains with
    /// duplicates removed, keeping the first occurrence. The type behaves
    /// like its first non-abstract parent.
    pub fn register_subtype(
        &mut self,
        type_name: &str,
        parents: &[&str],
        inflate: Option<InflateFn>,
    ) -> KaflowResult<()> {
        let mut ancestors: Vec<String> = Vec::new();
        let mut kind = None;

        for parent in parents {
            let descriptor = self.lookup(parent)?;
            if kind.is_none() {
                kind = descriptor.kind;
            }
            for ancestor in descriptor.chain() {
                if ancestor != type_name && !ancestors.contains(&ancestor) {
                    ancestors.push(ancestor);
                }
            }
        }

        self.register(TypeDescriptor {
            type_name: type_name.to_string(),
            ancestors,
            kind,
            inflate,
        })
    }

    /// Look up a type
    pub fn lookup(&self, component_type: &str) -> KaflowResult<&TypeDescriptor> {
        self.types
            .get(component_type)
            .ok_or_else(|| KaflowError::ClassNotFound {
                component_type: component_type.to_string(),
            })
    }

    /// Look up a type that can be instantiated
    pub fn concrete(&self, component_type: &str) -> KaflowResult<(&TypeDescriptor, ComponentKind)> {
        let descriptor = self.lookup(component_type)?;
        let kind = descriptor.kind.ok_or_else(|| KaflowError::AbstractType {
            component_type: component_type.to_string(),
        })?;
        Ok((descriptor, kind))
    }

    /// Ancestor chain of a type, the type itself first
    pub fn ancestors(&self, component_type: &str) -> KaflowResult<Vec<String>> {
        Ok(self.lookup(component_type)?.chain())
    }

    /// All registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
