pub mod callgraph;
pub mod calls;
pub mod contracts;
pub mod dependencies;
pub mod detectors;
pub mod functions;
pub mod guards;
pub mod inheritance;
pub mod resolve;
pub mod source;
pub mod storage_layout;
