//! Binary module assembly.
//!
//! Entries are accumulated per section as they are registered; each
//! section is framed as `id, byte length, entry count, entries` when the
//! module is finished. Sections are always written in increasing id
//! order and empty sections are omitted.

use crate::codegen_wasm::emit_chain;
use crate::error::CoreError;
use crate::leb128::{write_signed, write_unsigned};
use crate::node::Program;

pub const MAGIC: [u8; 4] = *b"\0asm";
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// The only value type: i32.
pub const I32: i64 = -0x01;
/// Type constructor of function signatures.
pub const FUNC: i64 = -0x20;

/// External kind of imported and exported functions.
const KIND_FUNCTION: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SectionId {
    Type = 1,
    Import = 2,
    Function = 3,
    Export = 7,
    Code = 10,
}

impl SectionId {
    pub const ALL: [SectionId; 5] = [
        SectionId::Type,
        SectionId::Import,
        SectionId::Function,
        SectionId::Export,
        SectionId::Code,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Default)]
struct Section {
    count: u32,
    entries: Vec<u8>,
}

impl Section {
    /// Reserve the next entry index.
    fn next_entry(&mut self) -> u32 {
        let index = self.count;
        self.count += 1;
        index
    }
}

#[derive(Debug, Default)]
pub struct ModuleBuilder {
    types: Section,
    imports: Section,
    functions: Section,
    exports: Section,
    code: Section,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder::default()
    }

    /// Register a function signature taking `params` and returning
    /// `results` i32 values. Returns the type index.
    pub fn add_type(&mut self, params: u32, results: u32) -> u32 {
        let index = self.types.next_entry();
        let sink = &mut self.types.entries;
        write_signed(sink, FUNC);
        write_unsigned(sink, u64::from(params));
        for _ in 0..params {
            write_signed(sink, I32);
        }
        write_unsigned(sink, u64::from(results));
        for _ in 0..results {
            write_signed(sink, I32);
        }
        index
    }

    /// Register an imported function. Returns its function index.
    ///
    /// Imports occupy the low function indices, so they must all be
    /// registered before the first export.
    pub fn add_import(
        &mut self,
        module: &str,
        field: &str,
        type_index: u32,
    ) -> Result<u32, CoreError> {
        if self.exports.count > 0 {
            return Err(CoreError::ImportAfterExport {
                module: module.to_string(),
                field: field.to_string(),
            });
        }
        self.check_type(type_index)?;
        let index = self.imports.next_entry();
        let sink = &mut self.imports.entries;
        write_name(sink, module);
        write_name(sink, field);
        sink.push(KIND_FUNCTION);
        write_unsigned(sink, u64::from(type_index));
        Ok(index)
    }

    /// Register a function whose body is `program`.
    ///
    /// Returns the index among defined functions, not counting imports.
    pub fn add_function(&mut self, type_index: u32, program: &Program) -> Result<u32, CoreError> {
        self.check_type(type_index)?;
        let index = self.functions.next_entry();
        write_unsigned(&mut self.functions.entries, u64::from(type_index));

        let mut body = Vec::new();
        // One local group holding every slot.
        write_unsigned(&mut body, 1);
        write_unsigned(&mut body, u64::from(program.local_count));
        write_signed(&mut body, I32);
        emit_chain(&program.body, &mut body);

        self.code.next_entry();
        write_unsigned(&mut self.code.entries, body.len() as u64);
        self.code.entries.extend_from_slice(&body);
        Ok(index)
    }

    /// Export a defined function under `field`.
    pub fn add_export(&mut self, field: &str, function_index: u32) -> Result<(), CoreError> {
        if function_index >= self.functions.count {
            return Err(CoreError::UnknownFunctionIndex(function_index));
        }
        self.exports.next_entry();
        let sink = &mut self.exports.entries;
        write_name(sink, field);
        sink.push(KIND_FUNCTION);
        write_unsigned(sink, u64::from(self.imports.count + function_index));
        Ok(())
    }

    /// Serialize the module: preamble followed by every non-empty section.
    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION);
        for id in SectionId::ALL {
            let section = self.section(id);
            if section.count == 0 {
                continue;
            }
            let mut payload = Vec::with_capacity(section.entries.len() + 5);
            write_unsigned(&mut payload, u64::from(section.count));
            payload.extend_from_slice(&section.entries);

            write_unsigned(&mut out, u64::from(id.code()));
            write_unsigned(&mut out, payload.len() as u64);
            out.extend_from_slice(&payload);
        }
        out
    }

    fn section(&self, id: SectionId) -> &Section {
        match id {
            SectionId::Type => &self.types,
            SectionId::Import => &self.imports,
            SectionId::Function => &self.functions,
            SectionId::Export => &self.exports,
            SectionId::Code => &self.code,
        }
    }

    fn check_type(&self, type_index: u32) -> Result<(), CoreError> {
        if type_index < self.types.count {
            Ok(())
        } else {
            Err(CoreError::UnknownTypeIndex(type_index))
        }
    }
}

fn write_name(sink: &mut Vec<u8>, name: &str) {
    write_unsigned(sink, name.len() as u64);
    sink.extend_from_slice(name.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leb128::read_unsigned;
    use crate::node::{BinaryOp, Chain, Expr, Stmt};
    use wasm_encoder::{
        CodeSection, EntityType, ExportKind, ExportSection, Function, FunctionSection,
        ImportSection, TypeSection, ValType,
    };

    fn sample_program() -> Program {
        let body: Chain = [
            Stmt::Declare {
                slot: 0,
                init: Expr::Const(300),
            },
            Stmt::Assign {
                slot: 0,
                value: Expr::binary(BinaryOp::Mul, Expr::Var(0), Expr::Const(-2)),
            },
            Stmt::Print { slot: 0 },
            Stmt::End,
        ]
        .into_iter()
        .collect();
        Program {
            body,
            local_count: 1,
        }
    }

    fn assemble(program: &Program) -> Vec<u8> {
        let mut builder = ModuleBuilder::new();
        let print_type = builder.add_type(1, 0);
        let entry_type = builder.add_type(0, 0);
        builder
            .add_import("imports", "imported_func", print_type)
            .expect("import");
        let entry = builder.add_function(entry_type, program).expect("function");
        builder.add_export("exported_func", entry).expect("export");
        builder.finish()
    }

    /// Section ids in the order they appear in `bytes`.
    fn section_ids(bytes: &[u8]) -> Vec<u64> {
        let mut ids = Vec::new();
        let mut offset = 8;
        while offset < bytes.len() {
            let (id, used) = read_unsigned(&bytes[offset..]).expect("section id");
            offset += used;
            let (len, used) = read_unsigned(&bytes[offset..]).expect("section size");
            offset += used + len as usize;
            ids.push(id);
        }
        ids
    }

    #[test]
    fn empty_module_is_just_the_preamble() {
        assert_eq!(
            ModuleBuilder::new().finish(),
            vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn encodes_type_entries() {
        let mut builder = ModuleBuilder::new();
        assert_eq!(builder.add_type(2, 1), 0);
        let bytes = builder.finish();
        assert_eq!(
            &bytes[8..],
            &[0x01, 0x07, 0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f]
        );
    }

    #[test]
    fn matches_wasm_encoder_byte_for_byte() {
        let program = sample_program();
        let ours = assemble(&program);

        let mut module = wasm_encoder::Module::new();
        let mut types = TypeSection::new();
        types.ty().function([ValType::I32], []);
        types.ty().function([], []);
        module.section(&types);
        let mut imports = ImportSection::new();
        imports.import("imports", "imported_func", EntityType::Function(0));
        module.section(&imports);
        let mut functions = FunctionSection::new();
        functions.function(1);
        module.section(&functions);
        let mut exports = ExportSection::new();
        exports.export("exported_func", ExportKind::Func, 1);
        module.section(&exports);
        let mut code = CodeSection::new();
        let mut function = Function::new([(program.local_count, ValType::I32)]);
        let mut body = Vec::new();
        emit_chain(&program.body, &mut body);
        function.raw(body);
        code.function(&function);
        module.section(&code);

        assert_eq!(ours, module.finish());
    }

    #[test]
    fn assembled_module_validates() {
        let bytes = assemble(&sample_program());
        wasmparser::validate(&bytes).expect("valid module");
        assert_eq!(section_ids(&bytes), vec![1, 2, 3, 7, 10]);
    }

    #[test]
    fn export_index_is_offset_by_imports() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(0, 0);
        builder.add_import("env", "a", ty).expect("import a");
        builder.add_import("env", "b", ty).expect("import b");
        let program = Program {
            body: [Stmt::End].into_iter().collect(),
            local_count: 0,
        };
        let entry = builder.add_function(ty, &program).expect("function");
        assert_eq!(entry, 0);
        builder.add_export("run", entry).expect("export");
        let bytes = builder.finish();
        // Export section: id, size, count, name "run", kind, index 2.
        let export = [0x07, 0x07, 0x01, 0x03, b'r', b'u', b'n', 0x00, 0x02];
        assert!(bytes.windows(export.len()).any(|window| window == &export[..]));
    }

    #[test]
    fn rejects_import_after_export() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(0, 0);
        let program = Program {
            body: [Stmt::End].into_iter().collect(),
            local_count: 0,
        };
        let entry = builder.add_function(ty, &program).expect("function");
        builder.add_export("run", entry).expect("export");
        let err = builder.add_import("env", "late", ty).unwrap_err();
        assert!(matches!(err, CoreError::ImportAfterExport { .. }));
    }

    #[test]
    fn rejects_unknown_indices() {
        let mut builder = ModuleBuilder::new();
        assert_eq!(
            builder.add_import("env", "f", 0).unwrap_err(),
            CoreError::UnknownTypeIndex(0)
        );
        assert_eq!(
            builder.add_export("f", 0).unwrap_err(),
            CoreError::UnknownFunctionIndex(0)
        );
    }
}
