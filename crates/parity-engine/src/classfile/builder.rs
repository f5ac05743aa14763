//! Assembler for binary classes
//!
//! Produces [`BinaryClass`] values without hand-writing bytes. Used by the
//! proxy generator, the tests and the benches.

use super::class::{
    access, BinaryClass, FieldInfo, InnerClassEntry, LocalVariable, MethodInfo, StackFrame,
    VerificationType, VERSION,
};
use super::descriptor::MethodDescriptor;
use super::encoder::BytecodeWriter;
use super::opcode::Opcode;
use super::symbols::SymbolTable;

/// Builder for a whole class
pub struct ClassBuilder {
    access: u16,
    symbols: SymbolTable,
    this_class: u32,
    super_class: Option<u32>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    inner_classes: Vec<InnerClassEntry>,
}

impl ClassBuilder {
    /// Start a public class with the given internal name
    pub fn new(name: &str) -> Self {
        let mut symbols = SymbolTable::new();
        let this_class = symbols.add_class(name);
        Self {
            access: access::PUBLIC,
            symbols,
            this_class,
            super_class: None,
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    /// Set the class access flags
    pub fn access(&mut self, flags: u16) -> &mut Self {
        self.access = flags;
        self
    }

    /// Set the superclass
    pub fn extends(&mut self, super_name: &str) -> &mut Self {
        self.super_class = Some(self.symbols.add_class(super_name));
        self
    }

    /// Mutable access to the symbol table, for hand-placed entries
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Declare a field
    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str) -> &mut Self {
        self.tagged_field(flags, name, descriptor, &[])
    }

    /// Declare a field carrying annotation tags
    pub fn tagged_field(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        tags: &[&str],
    ) -> &mut Self {
        let name = self.symbols.add_utf8(name);
        let descriptor = self.symbols.add_utf8(descriptor);
        let annotations = tags.iter().map(|tag| self.symbols.add_utf8(tag)).collect();
        self.fields.push(FieldInfo {
            access: flags,
            name,
            descriptor,
            annotations,
        });
        self
    }

    /// Record an inner-class relationship
    pub fn inner_class(
        &mut self,
        inner: &str,
        outer: Option<&str>,
        simple_name: Option<&str>,
        flags: u16,
    ) -> &mut Self {
        let inner = self.symbols.add_class(inner);
        let outer = outer.map(|name| self.symbols.add_class(name));
        let simple_name = simple_name.map(|name| self.symbols.add_utf8(name));
        self.inner_classes.push(InnerClassEntry {
            inner,
            outer,
            simple_name,
            access: flags,
        });
        self
    }

    /// Declare an abstract method (no body)
    pub fn abstract_method(&mut self, flags: u16, name: &str, descriptor: &str) -> &mut Self {
        let name = self.symbols.add_utf8(name);
        let descriptor = self.symbols.add_utf8(descriptor);
        self.methods.push(MethodInfo {
            access: flags | access::ABSTRACT,
            name,
            descriptor,
            annotations: Vec::new(),
            max_locals: 0,
            code: Vec::new(),
            local_variables: Vec::new(),
            stack_frames: None,
        });
        self
    }

    /// Start a method body; call [`CodeBuilder::finish`] to add it
    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str) -> CodeBuilder<'_> {
        let param_slots = MethodDescriptor::parse(descriptor)
            .map(|desc| desc.params.len())
            .unwrap_or(0);
        let param_slots = param_slots + usize::from(flags & access::STATIC == 0);
        CodeBuilder {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: flags,
            tags: Vec::new(),
            writer: BytecodeWriter::new(),
            max_locals: param_slots as u16,
            labels: Vec::new(),
            fixups: Vec::new(),
            locals: Vec::new(),
            frames: Vec::new(),
            owner: self,
        }
    }

    /// Finish the class
    pub fn build(self) -> BinaryClass {
        BinaryClass {
            version: VERSION,
            access: self.access,
            symbols: self.symbols,
            this_class: self.this_class,
            super_class: self.super_class,
            fields: self.fields,
            methods: self.methods,
            inner_classes: self.inner_classes,
        }
    }
}

/// Forward-referenceable code position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Builder for one method body
pub struct CodeBuilder<'a> {
    owner: &'a mut ClassBuilder,
    name: String,
    descriptor: String,
    access: u16,
    tags: Vec<String>,
    writer: BytecodeWriter,
    max_locals: u16,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
    locals: Vec<(String, String, u16)>,
    frames: Vec<(usize, Vec<VerificationType>, Vec<VerificationType>)>,
}

impl CodeBuilder<'_> {
    fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.writer.emit_opcode(opcode);
        self
    }

    fn op_symbol(&mut self, opcode: Opcode, index: u32) -> &mut Self {
        self.writer.emit_opcode(opcode);
        self.writer.emit_u32(index);
        self
    }

    /// Attach an annotation tag to the method
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Current code offset
    pub fn offset(&self) -> usize {
        self.writer.offset()
    }

    /// Symbol table of the class being built
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.owner.symbols
    }

    // ===== Stack & constants =====

    /// `Nop`
    pub fn nop(&mut self) -> &mut Self {
        self.op(Opcode::Nop)
    }

    /// `Pop`
    pub fn pop(&mut self) -> &mut Self {
        self.op(Opcode::Pop)
    }

    /// `Dup`
    pub fn dup(&mut self) -> &mut Self {
        self.op(Opcode::Dup)
    }

    /// `Swap`
    pub fn swap(&mut self) -> &mut Self {
        self.op(Opcode::Swap)
    }

    /// `ConstNull`
    pub fn const_null(&mut self) -> &mut Self {
        self.op(Opcode::ConstNull)
    }

    /// `ConstI32 value`
    pub fn const_i32(&mut self, value: i32) -> &mut Self {
        self.writer.emit_opcode(Opcode::ConstI32);
        self.writer.emit_i32(value);
        self
    }

    /// `Ldc` of a string literal
    pub fn ldc_str(&mut self, text: &str) -> &mut Self {
        let index = self.owner.symbols.add_string(text);
        self.op_symbol(Opcode::Ldc, index)
    }

    /// `Ldc` of an integer literal
    pub fn ldc_int(&mut self, value: i32) -> &mut Self {
        let index = self.owner.symbols.add_integer(value);
        self.op_symbol(Opcode::Ldc, index)
    }

    // ===== Locals =====

    fn touch_local(&mut self, slot: u16) {
        self.max_locals = self.max_locals.max(slot + 1);
    }

    /// `LoadLocal slot`
    pub fn load(&mut self, slot: u16) -> &mut Self {
        self.touch_local(slot);
        self.writer.emit_opcode(Opcode::LoadLocal);
        self.writer.emit_u16(slot);
        self
    }

    /// `StoreLocal slot`
    pub fn store(&mut self, slot: u16) -> &mut Self {
        self.touch_local(slot);
        self.writer.emit_opcode(Opcode::StoreLocal);
        self.writer.emit_u16(slot);
        self
    }

    /// Record a local-variable type entry covering the whole body
    pub fn local_variable(&mut self, name: &str, descriptor: &str, slot: u16) -> &mut Self {
        self.touch_local(slot);
        self.locals
            .push((name.to_string(), descriptor.to_string(), slot));
        self
    }

    /// Record a stack frame at the current offset
    pub fn stack_frame(
        &mut self,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    ) -> &mut Self {
        let offset = self.offset();
        self.frames.push((offset, locals, stack));
        self
    }

    /// `VerificationType::Object` for a class name, interned in this class
    pub fn object_type(&mut self, class: &str) -> VerificationType {
        VerificationType::Object(self.owner.symbols.add_class(class))
    }

    // ===== Arithmetic & comparison =====

    /// `Iadd`
    pub fn iadd(&mut self) -> &mut Self {
        self.op(Opcode::Iadd)
    }

    /// `Isub`
    pub fn isub(&mut self) -> &mut Self {
        self.op(Opcode::Isub)
    }

    /// `Imul`
    pub fn imul(&mut self) -> &mut Self {
        self.op(Opcode::Imul)
    }

    /// `Idiv`
    pub fn idiv(&mut self) -> &mut Self {
        self.op(Opcode::Idiv)
    }

    /// `Irem`
    pub fn irem(&mut self) -> &mut Self {
        self.op(Opcode::Irem)
    }

    /// `Ineg`
    pub fn ineg(&mut self) -> &mut Self {
        self.op(Opcode::Ineg)
    }

    /// `Ieq`
    pub fn ieq(&mut self) -> &mut Self {
        self.op(Opcode::Ieq)
    }

    /// `Ilt`
    pub fn ilt(&mut self) -> &mut Self {
        self.op(Opcode::Ilt)
    }

    /// `Igt`
    pub fn igt(&mut self) -> &mut Self {
        self.op(Opcode::Igt)
    }

    // ===== Control flow =====

    /// Create an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        let offset = self.offset();
        self.labels[label.0] = Some(offset);
        self
    }

    fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.writer.emit_opcode(opcode);
        let at = self.writer.reserve_i32();
        self.fixups.push((at, label));
        self
    }

    /// `Jmp label`
    pub fn jmp(&mut self, label: Label) -> &mut Self {
        self.jump(Opcode::Jmp, label)
    }

    /// `JmpIfFalse label`
    pub fn jmp_if_false(&mut self, label: Label) -> &mut Self {
        self.jump(Opcode::JmpIfFalse, label)
    }

    /// `JmpIfTrue label`
    pub fn jmp_if_true(&mut self, label: Label) -> &mut Self {
        self.jump(Opcode::JmpIfTrue, label)
    }

    /// `Return`
    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Return)
    }

    /// `ReturnVoid`
    pub fn ret_void(&mut self) -> &mut Self {
        self.op(Opcode::ReturnVoid)
    }

    /// `Throw`
    pub fn throw(&mut self) -> &mut Self {
        self.op(Opcode::Throw)
    }

    // ===== Calls =====

    /// `InvokeVirtual class.name descriptor`
    pub fn invoke_virtual(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_method_ref(class, name, descriptor);
        self.op_symbol(Opcode::InvokeVirtual, index)
    }

    /// `InvokeStatic class.name descriptor`
    pub fn invoke_static(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_method_ref(class, name, descriptor);
        self.op_symbol(Opcode::InvokeStatic, index)
    }

    /// `InvokeSpecial class.name descriptor`
    pub fn invoke_special(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_method_ref(class, name, descriptor);
        self.op_symbol(Opcode::InvokeSpecial, index)
    }

    /// `InvokeDynamic name descriptor`
    pub fn invoke_dynamic(&mut self, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_name_and_type(name, descriptor);
        self.op_symbol(Opcode::InvokeDynamic, index)
    }

    // ===== Objects =====

    /// `New class`
    pub fn new_object(&mut self, class: &str) -> &mut Self {
        let index = self.owner.symbols.add_class(class);
        self.op_symbol(Opcode::New, index)
    }

    /// `GetField class.name descriptor`
    pub fn get_field(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_field_ref(class, name, descriptor);
        self.op_symbol(Opcode::GetField, index)
    }

    /// `PutField class.name descriptor`
    pub fn put_field(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_field_ref(class, name, descriptor);
        self.op_symbol(Opcode::PutField, index)
    }

    /// `GetStatic class.name descriptor`
    pub fn get_static(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_field_ref(class, name, descriptor);
        self.op_symbol(Opcode::GetStatic, index)
    }

    /// `PutStatic class.name descriptor`
    pub fn put_static(&mut self, class: &str, name: &str, descriptor: &str) -> &mut Self {
        let index = self.owner.symbols.add_field_ref(class, name, descriptor);
        self.op_symbol(Opcode::PutStatic, index)
    }

    /// `CheckCast class`
    pub fn check_cast(&mut self, class: &str) -> &mut Self {
        let index = self.owner.symbols.add_class(class);
        self.op_symbol(Opcode::CheckCast, index)
    }

    /// `InstanceOf class`
    pub fn instance_of(&mut self, class: &str) -> &mut Self {
        let index = self.owner.symbols.add_class(class);
        self.op_symbol(Opcode::InstanceOf, index)
    }

    /// `InstanceOf` of an array type
    pub fn instance_of_array(&mut self, element_descriptor: &str, dims: u8) -> &mut Self {
        let index = self.owner.symbols.add_array_class(element_descriptor, dims);
        self.op_symbol(Opcode::InstanceOf, index)
    }

    // ===== Arrays =====

    /// `NewArray` of class-typed elements
    pub fn new_array(&mut self, element_class: &str) -> &mut Self {
        let index = self.owner.symbols.add_class(element_class);
        self.op_symbol(Opcode::NewArray, index)
    }

    /// `MultiNewArray element dims`
    pub fn multi_new_array(&mut self, element_descriptor: &str, dims: u8) -> &mut Self {
        let index = self.owner.symbols.add_array_class(element_descriptor, dims);
        self.writer.emit_opcode(Opcode::MultiNewArray);
        self.writer.emit_u32(index);
        self.writer.emit_u8(dims);
        self
    }

    /// `ArrayLen`
    pub fn array_len(&mut self) -> &mut Self {
        self.op(Opcode::ArrayLen)
    }

    /// `LoadElem`
    pub fn load_elem(&mut self) -> &mut Self {
        self.op(Opcode::LoadElem)
    }

    /// `StoreElem`
    pub fn store_elem(&mut self) -> &mut Self {
        self.op(Opcode::StoreElem)
    }

    /// Resolve labels and add the method to the class
    pub fn finish(&mut self) {
        for &(at, label) in &self.fixups {
            // Unbound labels jump to the end of the body
            let target = self.labels[label.0].unwrap_or_else(|| self.writer.offset());
            let relative = target as i64 - (at as i64 + 4);
            self.writer.patch_i32(at, relative as i32);
        }
        self.fixups.clear();

        let code = std::mem::take(&mut self.writer).into_bytes();
        let symbols = &mut self.owner.symbols;
        let local_variables = self
            .locals
            .drain(..)
            .map(|(name, descriptor, slot)| LocalVariable {
                start: 0,
                length: code.len() as u32,
                name: symbols.add_utf8(&name),
                descriptor: symbols.add_utf8(&descriptor),
                slot,
            })
            .collect();
        let stack_frames = if self.frames.is_empty() {
            None
        } else {
            Some(
                self.frames
                    .drain(..)
                    .map(|(offset, locals, stack)| StackFrame {
                        offset: offset as u32,
                        locals,
                        stack,
                    })
                    .collect(),
            )
        };

        let method = MethodInfo {
            access: self.access,
            name: symbols.add_utf8(&self.name),
            descriptor: symbols.add_utf8(&self.descriptor),
            annotations: self.tags.iter().map(|tag| symbols.add_utf8(tag)).collect(),
            max_locals: self.max_locals,
            code,
            local_variables,
            stack_frames,
        };
        self.owner.methods.push(method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::code::decode_instructions;

    #[test]
    fn test_labels_resolve_forward_and_backward() {
        let mut builder = ClassBuilder::new("Loop");
        let mut code = builder.method(access::STATIC, "spin", "(I)I");
        let top = code.new_label();
        let done = code.new_label();
        code.bind(top)
            .load(0)
            .jmp_if_false(done)
            .load(0)
            .const_i32(1)
            .isub()
            .store(0)
            .jmp(top)
            .bind(done)
            .load(0)
            .ret()
            .finish();
        let class = builder.build();

        let method = &class.methods[0];
        let instrs = decode_instructions(&method.code).unwrap();
        let branch = &instrs[1];
        let back = &instrs[6];
        assert_eq!(branch.jump_target(), Some(instrs[7].offset));
        assert_eq!(back.jump_target(), Some(0));
        assert_eq!(method.max_locals, 1);
    }

    #[test]
    fn test_instance_methods_reserve_this() {
        let mut builder = ClassBuilder::new("Widget");
        builder
            .method(access::PUBLIC, "get", "(II)I")
            .load(1)
            .ret()
            .finish();
        let class = builder.build();
        assert_eq!(class.methods[0].max_locals, 3);
    }

    #[test]
    fn test_tags_and_locals_are_interned() {
        let mut builder = ClassBuilder::new("Widget");
        builder
            .method(access::PUBLIC | access::STATIC, "gen", "()LWidget;")
            .tag("parity/Generator")
            .local_variable("w", "LWidget;", 0)
            .const_null()
            .ret()
            .finish();
        let class = builder.build();
        let method = &class.methods[0];
        assert_eq!(class.symbols.utf8(method.annotations[0]).unwrap(), "parity/Generator");
        assert_eq!(
            class.symbols.utf8(method.local_variables[0].descriptor).unwrap(),
            "LWidget;"
        );
        assert_eq!(method.local_variables[0].length as usize, method.code.len());
    }
}
