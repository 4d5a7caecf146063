//! Host functions and exported entry points of compiled modules.
//!
//! This module only describes the host interface; the assembler maps
//! these descriptors to import and export entries, and embedders use
//! the same names when linking a module.

/// A function imported from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostImport {
    /// Import module name.
    pub module: &'static str,
    /// Import field name.
    pub field: &'static str,
    /// Number of i32 parameters.
    pub params: u32,
    /// Number of i32 results.
    pub results: u32,
}

/// Receives every printed value: `(i32) -> ()`.
pub const PRINT: HostImport = HostImport {
    module: "imports",
    field: "imported_func",
    params: 1,
    results: 0,
};

/// Imports in function index order. Print must stay first, the code
/// generator calls it as function 0.
pub const HOST_IMPORTS: &[HostImport] = &[PRINT];

/// Export name of the compiled program: `() -> ()`.
pub const ENTRY_EXPORT: &str = "exported_func";
