pub mod dataset_io;
pub mod lock;
pub mod recovery;
