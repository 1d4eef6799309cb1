pub mod affinity_planner;
pub mod allocator;
pub mod allocators;
pub mod mapping;
pub mod overlay;
pub mod profile;
pub mod repository;
pub mod tags;
