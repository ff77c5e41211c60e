//! Microscopic road-traffic simulation kernel: a curved-geometry road
//! network, IDM car-following with intersection priority and do-not-block
//! avoidance, A*-like routing, and a traffic manager that spawns and retires
//! vehicles against configured traffic volumes.
//!
//! The kernel has no rendering, scripting, or process-entry-point surface of
//! its own -- those are external collaborators built on top of the types
//! exposed here.

pub mod geom;
pub mod curve;
pub mod error;
pub mod randomizer;
pub mod signal;
pub mod network;
pub mod routing;
pub mod vehicle;
pub mod traffic_manager;
pub mod simulation;
pub mod xml_import;
