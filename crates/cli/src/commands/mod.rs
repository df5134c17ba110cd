pub mod doctor;
pub mod feedback;
pub mod ingest;
pub mod init;
pub mod memory;
pub mod run;
