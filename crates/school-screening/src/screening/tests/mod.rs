mod common;
mod merge;
