#![deny(warnings)]

// File and process operation implementations

pub mod catfile;
pub mod exec;
pub mod gitignore;
pub mod mime;
pub mod mkfile;
pub mod mkfolder;
pub mod rmfile;
pub mod sandbox;
pub mod script;
pub mod unitsize;
