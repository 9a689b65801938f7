pub mod backend;
pub mod random;
pub mod report_service;
pub mod scan_registry;
pub mod scan_service;
pub mod simulator;
pub mod task_manager;

// Re-export commonly used types
pub use backend::{ConfigBackend, ReportBackend, ScanBackend};
pub use random::{RandomSource, ScriptedRandom, ThreadRandom};
pub use report_service::ReportService;
pub use scan_registry::ScanRegistry;
pub use scan_service::ScanService;
pub use simulator::{generate_findings, ScanSimulator, SimulatorTiming};
pub use task_manager::TaskManager;
