//! Sets & collectors (C6).

pub mod collector;
pub mod content;

pub use collector::Collector;
pub use content::{CollectibleProperty, SetContent, SetResult};

use crate::variable::Scope;

#[derive(Debug, Clone)]
pub struct SetDefinition {
    pub name: String,
    pub scope: Scope,
    pub content: SetContent,
}
