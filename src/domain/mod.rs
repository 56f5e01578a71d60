pub mod aggregation;
pub mod descendants;
pub mod edge;
pub mod error;
pub mod feature;
pub mod graph;
pub mod hierarchy;
pub mod highlight;
pub mod lock;
pub mod node;
pub mod ports;
pub mod property;
pub mod trace;
pub mod view;
