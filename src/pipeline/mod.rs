//! Tabular side of the pipeline.
//!
//! Cell rows from every timestep are accumulated ([`assemble`]), persisted,
//! joined to the administrative lookup ([`region`]), averaged per area and
//! hour ([`aggregate`]) and graded ([`grade`]). [`runner`] ties the stages
//! together.

pub mod aggregate;
pub mod assemble;
pub mod grade;
pub mod region;
pub mod runner;
pub mod types;
pub mod utility;
