//! The introspection tool catalog. Every executor is read-only against the project root.

mod analysis;
mod controllers;
mod entities;
mod files;
mod roles;
mod routes;
mod search;

pub use analysis::GetContextualCodeAnalysis;
pub use controllers::{controller_actions, controller_names, GetControllers};
pub use entities::{
    analyze_entity, entity_names, EntityAnalysis, EntityProperty, EntityRelationship, GetEntities,
};
pub use files::{GetFileContent, GetProjectStructure, ReadDirectory};
pub use roles::GetUserRoles;
pub use routes::{attribute_routes, yaml_routes, GetRoutes, RouteInfo};
pub use search::SearchCode;

use super::tools::ToolExecutor;

pub fn catalog() -> Vec<Box<dyn ToolExecutor>> {
    vec![
        Box::new(GetEntities),
        Box::new(GetControllers),
        Box::new(GetRoutes),
        Box::new(GetFileContent),
        Box::new(SearchCode),
        Box::new(ReadDirectory),
        Box::new(GetProjectStructure),
        Box::new(GetUserRoles),
        Box::new(GetContextualCodeAnalysis),
    ]
}
