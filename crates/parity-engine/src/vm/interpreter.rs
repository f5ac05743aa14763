//! Bytecode interpreter
//!
//! A straightforward stack machine over the class-file instruction set.
//! Symbols are resolved by name against the interpreter's class space at
//! the moment they execute, so a class may refer to classes defined after it.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::class::{MethodBody, RuntimeClass};
use super::loader::ClassSpace;
use super::object::{Instantiator, ObjectRef};
use super::value::{ArrayRef, Value};
use super::{VmError, VmResult};
use crate::classfile::{
    decode_instructions, BinaryClass, ClassFileError, ClassSymbol, Instruction, MethodDescriptor,
    Opcode, Symbol,
};

/// Default maximum call depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Executes methods of classes visible from one class space
pub struct Interpreter {
    space: Arc<ClassSpace>,
    max_depth: usize,
}

impl Interpreter {
    /// Interpreter resolving classes in `space`
    pub fn new(space: Arc<ClassSpace>) -> Self {
        Self {
            space,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the maximum call depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Class space used for resolution
    pub fn space(&self) -> &Arc<ClassSpace> {
        &self.space
    }

    /// Resolve a class by internal name
    pub fn resolve_class(&self, name: &str) -> VmResult<Arc<RuntimeClass>> {
        self.space
            .lookup(name)
            .ok_or_else(|| VmError::ClassNotFound(name.to_string()))
    }

    /// Allocate an instance without running a constructor
    pub fn allocate(&self, class_name: &str) -> VmResult<ObjectRef> {
        let class = self.resolve_class(class_name)?;
        Ok(Instantiator::new(class).new_instance())
    }

    /// Allocate an instance and run the `<init>` matching `descriptor`
    pub fn instantiate(
        &self,
        class_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> VmResult<ObjectRef> {
        let object = self.allocate(class_name)?;
        let class = Arc::clone(object.class());
        let (owner, index) = class.find_method("<init>", descriptor).ok_or_else(|| {
            VmError::NoSuchMethod {
                class: class_name.to_string(),
                name: "<init>".to_string(),
                descriptor: descriptor.to_string(),
            }
        })?;
        self.invoke_at(&owner, index, Some(&object), args, 0)?;
        Ok(object)
    }

    /// Call a static method
    pub fn invoke_static(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        let class = self.resolve_class(class_name)?;
        let (owner, index) = find_method(&class, name, descriptor)?;
        self.invoke_at(&owner, index, None, args, 0)
    }

    /// Call an instance method with virtual dispatch on the receiver
    pub fn invoke_virtual(
        &self,
        receiver: &ObjectRef,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        let (owner, index) = find_method(receiver.class(), name, descriptor)?;
        self.invoke_at(&owner, index, Some(receiver), args, 0)
    }

    /// Call a resolved method directly
    pub fn invoke(
        &self,
        class: &Arc<RuntimeClass>,
        index: usize,
        receiver: Option<&ObjectRef>,
        args: Vec<Value>,
    ) -> VmResult<Value> {
        self.invoke_at(class, index, receiver, args, 0)
    }

    fn invoke_at(
        &self,
        class: &Arc<RuntimeClass>,
        index: usize,
        receiver: Option<&ObjectRef>,
        args: Vec<Value>,
        depth: usize,
    ) -> VmResult<Value> {
        if depth > self.max_depth {
            return Err(VmError::StackOverflow);
        }
        let method = class.method(index).ok_or_else(|| {
            VmError::TypeError(format!("no method #{} on {}", index, class.name()))
        })?;
        let descriptor = parse_descriptor(&method.descriptor)?;
        if descriptor.params.len() != args.len() {
            return Err(VmError::TypeError(format!(
                "{}.{}{} expects {} arguments, got {}",
                class.name(),
                method.name,
                method.descriptor,
                descriptor.params.len(),
                args.len()
            )));
        }
        let receiver = if method.is_static() {
            None
        } else {
            Some(receiver.ok_or(VmError::NullPointer)?)
        };

        match method.body {
            MethodBody::Bytecode(binary_index) => {
                let binary = class.binary().ok_or_else(|| {
                    VmError::TypeError(format!("{} has no bytecode", class.name()))
                })?;
                let mut locals = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = receiver {
                    locals.push(Value::Object(receiver.clone()));
                }
                locals.extend(args);
                let max_locals = binary.methods[binary_index].max_locals as usize;
                if locals.len() < max_locals {
                    locals.resize(max_locals, Value::Null);
                }
                self.execute(class, binary, binary_index, locals, depth)
            }
            MethodBody::Abstract => Err(VmError::AbstractMethod {
                class: class.name().to_string(),
                name: method.name.clone(),
            }),
            MethodBody::Intercepted => {
                let receiver = receiver.ok_or(VmError::NullPointer)?;
                let handler = receiver
                    .handler()
                    .ok_or_else(|| VmError::NoHandler(receiver.class().name().to_string()))?;
                handler.invoke(self, receiver, method, args)
            }
        }
    }

    fn execute(
        &self,
        class: &Arc<RuntimeClass>,
        binary: &BinaryClass,
        method_index: usize,
        mut locals: Vec<Value>,
        depth: usize,
    ) -> VmResult<Value> {
        let code = &binary.methods[method_index].code;
        let symbols = &binary.symbols;
        let instructions = decode_instructions(code).map_err(ClassFileError::from)?;
        let positions: FxHashMap<usize, usize> = instructions
            .iter()
            .enumerate()
            .map(|(i, instr)| (instr.offset, i))
            .collect();

        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0usize;

        loop {
            let instr = instructions.get(pc).ok_or(VmError::FellOffEnd)?;
            pc += 1;

            match instr.opcode {
                Opcode::Nop => {}
                Opcode::Pop => {
                    pop(&mut stack)?;
                }
                Opcode::Dup => {
                    let top = stack.last().cloned().ok_or(VmError::StackUnderflow)?;
                    stack.push(top);
                }
                Opcode::Swap => {
                    let b = pop(&mut stack)?;
                    let a = pop(&mut stack)?;
                    stack.push(b);
                    stack.push(a);
                }
                Opcode::ConstNull => stack.push(Value::Null),
                Opcode::ConstI32 => stack.push(Value::Int(instr.immediate().unwrap_or(0))),
                Opcode::Ldc => {
                    let index = symbol_of(instr)?;
                    let value = match symbols.get(index) {
                        Some(Symbol::Integer(v)) => Value::Int(*v),
                        Some(Symbol::String { utf8 }) => Value::from(symbols.utf8(*utf8)?),
                        _ => {
                            return Err(VmError::TypeError(format!(
                                "Ldc of non-literal symbol {}",
                                index
                            )))
                        }
                    };
                    stack.push(value);
                }

                Opcode::LoadLocal => {
                    let slot = local_of(instr, &locals)?;
                    stack.push(locals[slot].clone());
                }
                Opcode::StoreLocal => {
                    let slot = local_of(instr, &locals)?;
                    locals[slot] = pop(&mut stack)?;
                }

                Opcode::Iadd | Opcode::Isub | Opcode::Imul | Opcode::Idiv | Opcode::Irem => {
                    let b = pop_int(&mut stack)?;
                    let a = pop_int(&mut stack)?;
                    let result = match instr.opcode {
                        Opcode::Iadd => a.wrapping_add(b),
                        Opcode::Isub => a.wrapping_sub(b),
                        Opcode::Imul => a.wrapping_mul(b),
                        _ if b == 0 => return Err(VmError::DivisionByZero),
                        Opcode::Idiv => a.wrapping_div(b),
                        _ => a.wrapping_rem(b),
                    };
                    stack.push(Value::Int(result));
                }
                Opcode::Ineg => {
                    let a = pop_int(&mut stack)?;
                    stack.push(Value::Int(a.wrapping_neg()));
                }
                Opcode::Ieq | Opcode::Ilt | Opcode::Igt => {
                    let b = pop_int(&mut stack)?;
                    let a = pop_int(&mut stack)?;
                    let result = match instr.opcode {
                        Opcode::Ieq => a == b,
                        Opcode::Ilt => a < b,
                        _ => a > b,
                    };
                    stack.push(Value::Int(result as i32));
                }

                Opcode::Jmp | Opcode::JmpIfFalse | Opcode::JmpIfTrue => {
                    let taken = match instr.opcode {
                        Opcode::Jmp => true,
                        Opcode::JmpIfFalse => !pop(&mut stack)?.is_truthy(),
                        _ => pop(&mut stack)?.is_truthy(),
                    };
                    if taken {
                        pc = instr
                            .jump_target()
                            .and_then(|target| positions.get(&target).copied())
                            .ok_or_else(|| {
                                VmError::TypeError(format!(
                                    "bad jump target at offset {}",
                                    instr.offset
                                ))
                            })?;
                    }
                }
                Opcode::Return => return pop(&mut stack),
                Opcode::ReturnVoid => return Ok(Value::Null),
                Opcode::Throw => return Err(VmError::Thrown(pop(&mut stack)?)),

                Opcode::InvokeVirtual | Opcode::InvokeStatic | Opcode::InvokeSpecial => {
                    let member = symbols.member_ref(symbol_of(instr)?)?;
                    let descriptor = parse_descriptor(member.descriptor)?;
                    let args = pop_args(&mut stack, descriptor.params.len())?;
                    let owner = self.resolve_class(member.class_name)?;
                    let (declaring, index) = find_method(&owner, member.name, member.descriptor)?;

                    let result = match instr.opcode {
                        Opcode::InvokeStatic => {
                            self.invoke_at(&declaring, index, None, args, depth + 1)?
                        }
                        Opcode::InvokeSpecial => {
                            let receiver = pop_object(&mut stack)?;
                            self.invoke_at(&declaring, index, Some(&receiver), args, depth + 1)?
                        }
                        _ => {
                            let receiver = pop_object(&mut stack)?;
                            let (target, index) =
                                find_method(receiver.class(), member.name, member.descriptor)?;
                            self.invoke_at(&target, index, Some(&receiver), args, depth + 1)?
                        }
                    };
                    if descriptor.returns_value() {
                        stack.push(result);
                    }
                }
                Opcode::InvokeDynamic => {
                    // Call sites bind to a static method of the calling class
                    let (name, raw) = symbols.name_and_type(symbol_of(instr)?)?;
                    let descriptor = parse_descriptor(raw)?;
                    let args = pop_args(&mut stack, descriptor.params.len())?;
                    let (declaring, index) = find_method(class, name, raw)?;
                    let result = self.invoke_at(&declaring, index, None, args, depth + 1)?;
                    if descriptor.returns_value() {
                        stack.push(result);
                    }
                }

                Opcode::New => {
                    let name = symbols.class_name(symbol_of(instr)?)?;
                    stack.push(Value::Object(self.allocate(name)?));
                }
                Opcode::GetField | Opcode::PutField | Opcode::GetStatic | Opcode::PutStatic => {
                    let member = symbols.member_ref(symbol_of(instr)?)?;
                    let owner = self.resolve_class(member.class_name)?;
                    let (declaring, field) =
                        owner
                            .find_field(member.name)
                            .ok_or_else(|| VmError::NoSuchField {
                                class: member.class_name.to_string(),
                                name: member.name.to_string(),
                            })?;
                    let is_static_op =
                        matches!(instr.opcode, Opcode::GetStatic | Opcode::PutStatic);
                    if field.is_static() != is_static_op {
                        return Err(VmError::TypeError(format!(
                            "{} on {} field {}.{}",
                            instr.opcode.name(),
                            if field.is_static() { "static" } else { "instance" },
                            declaring.name(),
                            field.name
                        )));
                    }
                    let missing = |class: &str| VmError::NoSuchField {
                        class: class.to_string(),
                        name: field.name.clone(),
                    };
                    match instr.opcode {
                        Opcode::GetField => {
                            let object = pop_object(&mut stack)?;
                            let value = object
                                .get_field(&field.name)
                                .ok_or_else(|| missing(object.class().name()))?;
                            stack.push(value);
                        }
                        Opcode::PutField => {
                            let value = pop(&mut stack)?;
                            let object = pop_object(&mut stack)?;
                            if !object.set_field(&field.name, value) {
                                return Err(missing(object.class().name()));
                            }
                        }
                        Opcode::GetStatic => {
                            let value = declaring
                                .get_static(&field.name)
                                .ok_or_else(|| missing(declaring.name()))?;
                            stack.push(value);
                        }
                        _ => {
                            let value = pop(&mut stack)?;
                            if !declaring.set_static(&field.name, value) {
                                return Err(missing(declaring.name()));
                            }
                        }
                    }
                }
                Opcode::CheckCast | Opcode::InstanceOf => {
                    let target = symbols.class_symbol(symbol_of(instr)?)?;
                    let value = pop(&mut stack)?;
                    let matches = is_instance(&value, &target);
                    if instr.opcode == Opcode::InstanceOf {
                        stack.push(Value::Int(matches as i32));
                    } else if matches || value.is_null() {
                        stack.push(value);
                    } else {
                        return Err(VmError::ClassCast {
                            value: format!("{:?}", value),
                            target: describe(&target),
                        });
                    }
                }

                Opcode::NewArray => {
                    let component = match symbols.class_symbol(symbol_of(instr)?)? {
                        ClassSymbol::Class(name) => format!("L{};", name),
                        ClassSymbol::Array { element, dims } => array_descriptor(element, dims),
                    };
                    let length = pop_length(&mut stack)?;
                    stack.push(Value::Array(ArrayRef::new(format!("[{}", component), length)));
                }
                Opcode::MultiNewArray => {
                    let (element, total) = match symbols.class_symbol(symbol_of(instr)?)? {
                        ClassSymbol::Array { element, dims } => (element, dims),
                        ClassSymbol::Class(name) => {
                            return Err(VmError::TypeError(format!(
                                "MultiNewArray of non-array class {}",
                                name
                            )))
                        }
                    };
                    let count = instr.dims().unwrap_or(1) as usize;
                    let mut lengths = Vec::with_capacity(count);
                    for _ in 0..count {
                        lengths.push(pop_length(&mut stack)?);
                    }
                    lengths.reverse();
                    let array = new_multi_array(&array_descriptor(element, total), &lengths);
                    stack.push(Value::Array(array));
                }
                Opcode::ArrayLen => {
                    let array = pop_array(&mut stack)?;
                    stack.push(Value::Int(array.len() as i32));
                }
                Opcode::LoadElem => {
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let value = usize::try_from(index)
                        .ok()
                        .and_then(|i| array.get(i))
                        .ok_or(VmError::IndexOutOfBounds {
                            index,
                            length: array.len(),
                        })?;
                    stack.push(value);
                }
                Opcode::StoreElem => {
                    let value = pop(&mut stack)?;
                    let index = pop_int(&mut stack)?;
                    let array = pop_array(&mut stack)?;
                    let stored = usize::try_from(index)
                        .map(|i| array.set(i, value))
                        .unwrap_or(false);
                    if !stored {
                        return Err(VmError::IndexOutOfBounds {
                            index,
                            length: array.len(),
                        });
                    }
                }
            }
        }
    }
}

fn find_method(
    class: &Arc<RuntimeClass>,
    name: &str,
    descriptor: &str,
) -> VmResult<(Arc<RuntimeClass>, usize)> {
    class
        .find_method(name, descriptor)
        .ok_or_else(|| VmError::NoSuchMethod {
            class: class.name().to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
}

fn parse_descriptor(descriptor: &str) -> VmResult<MethodDescriptor> {
    MethodDescriptor::parse(descriptor).map_err(|e| VmError::TypeError(e.to_string()))
}

fn symbol_of(instr: &Instruction) -> VmResult<u32> {
    instr
        .symbol()
        .ok_or_else(|| VmError::TypeError(format!("{} has no symbol", instr.opcode.name())))
}

fn local_of(instr: &Instruction, locals: &[Value]) -> VmResult<usize> {
    let slot = instr.local().unwrap_or(u16::MAX) as usize;
    if slot >= locals.len() {
        return Err(VmError::TypeError(format!(
            "local {} out of range at offset {}",
            slot, instr.offset
        )));
    }
    Ok(slot)
}

fn pop(stack: &mut Vec<Value>) -> VmResult<Value> {
    stack.pop().ok_or(VmError::StackUnderflow)
}

fn pop_int(stack: &mut Vec<Value>) -> VmResult<i32> {
    match pop(stack)? {
        Value::Int(v) => Ok(v),
        other => Err(VmError::TypeError(format!("expected int, got {:?}", other))),
    }
}

fn pop_length(stack: &mut Vec<Value>) -> VmResult<usize> {
    let length = pop_int(stack)?;
    usize::try_from(length)
        .map_err(|_| VmError::TypeError(format!("negative array size {}", length)))
}

fn pop_object(stack: &mut Vec<Value>) -> VmResult<ObjectRef> {
    match pop(stack)? {
        Value::Object(object) => Ok(object),
        Value::Null => Err(VmError::NullPointer),
        other => Err(VmError::TypeError(format!(
            "expected object, got {:?}",
            other
        ))),
    }
}

fn pop_array(stack: &mut Vec<Value>) -> VmResult<ArrayRef> {
    match pop(stack)? {
        Value::Array(array) => Ok(array),
        Value::Null => Err(VmError::NullPointer),
        other => Err(VmError::TypeError(format!("expected array, got {:?}", other))),
    }
}

fn pop_args(stack: &mut Vec<Value>, count: usize) -> VmResult<Vec<Value>> {
    if stack.len() < count {
        return Err(VmError::StackUnderflow);
    }
    Ok(stack.split_off(stack.len() - count))
}

fn array_descriptor(element: &str, dims: u8) -> String {
    format!("{}{}", "[".repeat(dims as usize), element)
}

fn describe(target: &ClassSymbol<'_>) -> String {
    match target {
        ClassSymbol::Class(name) => name.to_string(),
        ClassSymbol::Array { element, dims } => array_descriptor(element, *dims),
    }
}

/// Instance test; arrays match on their exact descriptor
fn is_instance(value: &Value, target: &ClassSymbol<'_>) -> bool {
    match (value, target) {
        (Value::Object(object), ClassSymbol::Class(name)) => object.class().is_subclass_of(name),
        (Value::Array(array), ClassSymbol::Array { element, dims }) => {
            array.descriptor() == array_descriptor(element, *dims)
        }
        _ => false,
    }
}

fn new_multi_array(descriptor: &str, lengths: &[usize]) -> ArrayRef {
    let array = ArrayRef::new(descriptor, lengths[0]);
    if lengths.len() > 1 {
        for i in 0..lengths[0] {
            array.set(i, Value::Array(new_multi_array(&descriptor[1..], &lengths[1..])));
        }
    }
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{access, ClassBuilder};
    use crate::vm::BytesClassLoader;

    fn interpreter_with(builders: Vec<ClassBuilder>) -> Interpreter {
        let space = ClassSpace::new();
        let loader = BytesClassLoader::new(space.clone());
        for builder in builders {
            loader.define_class(&builder.build().encode()).unwrap();
        }
        Interpreter::new(space)
    }

    fn counter() -> ClassBuilder {
        let mut builder = ClassBuilder::new("Counter");
        builder.field(access::PUBLIC, "value", "I");
        builder.field(access::PUBLIC | access::STATIC, "created", "I");
        builder
            .method(access::PUBLIC, "<init>", "(I)V")
            .load(0)
            .load(1)
            .put_field("Counter", "value", "I")
            .get_static("Counter", "created", "I")
            .const_i32(1)
            .iadd()
            .put_static("Counter", "created", "I")
            .ret_void()
            .finish();
        builder
            .method(access::PUBLIC, "scaled", "(I)I")
            .load(0)
            .get_field("Counter", "value", "I")
            .load(1)
            .imul()
            .ret()
            .finish();
        builder
    }

    #[test]
    fn test_constructor_fields_and_statics() {
        let interp = interpreter_with(vec![counter()]);
        let counter = interp
            .instantiate("Counter", "(I)V", vec![Value::Int(6)])
            .unwrap();
        assert_eq!(counter.get_field("value"), Some(Value::Int(6)));
        let scaled = interp
            .invoke_virtual(&counter, "scaled", "(I)I", vec![Value::Int(7)])
            .unwrap();
        assert_eq!(scaled, Value::Int(42));

        let class = interp.resolve_class("Counter").unwrap();
        assert_eq!(class.get_static("created"), Some(Value::Int(1)));
    }

    #[test]
    fn test_loop_and_branches() {
        let mut builder = ClassBuilder::new("Math");
        let mut code = builder.method(access::PUBLIC | access::STATIC, "sum", "(I)I");
        let top = code.new_label();
        let done = code.new_label();
        code.const_i32(0)
            .store(1)
            .bind(top)
            .load(0)
            .const_i32(0)
            .igt()
            .jmp_if_false(done)
            .load(1)
            .load(0)
            .iadd()
            .store(1)
            .load(0)
            .const_i32(1)
            .isub()
            .store(0)
            .jmp(top)
            .bind(done)
            .load(1)
            .ret()
            .finish();
        let interp = interpreter_with(vec![builder]);
        let result = interp
            .invoke_static("Math", "sum", "(I)I", vec![Value::Int(4)])
            .unwrap();
        assert_eq!(result, Value::Int(10));
    }

    #[test]
    fn test_virtual_dispatch_uses_receiver_class() {
        let mut base = ClassBuilder::new("Base");
        base.method(access::PUBLIC, "id", "()I")
            .const_i32(1)
            .ret()
            .finish();
        base.method(access::PUBLIC | access::STATIC, "call", "(LBase;)I")
            .load(0)
            .invoke_virtual("Base", "id", "()I")
            .ret()
            .finish();
        let mut derived = ClassBuilder::new("Derived");
        derived.extends("Base");
        derived
            .method(access::PUBLIC, "id", "()I")
            .const_i32(2)
            .ret()
            .finish();

        let interp = interpreter_with(vec![base, derived]);
        let object = interp.allocate("Derived").unwrap();
        let result = interp
            .invoke_static("Base", "call", "(LBase;)I", vec![Value::Object(object)])
            .unwrap();
        assert_eq!(result, Value::Int(2));
    }

    #[test]
    fn test_throw_propagates_value() {
        let mut builder = ClassBuilder::new("Thrower");
        builder
            .method(access::PUBLIC | access::STATIC, "fail", "()V")
            .ldc_str("boom")
            .throw()
            .finish();
        let interp = interpreter_with(vec![builder]);
        let err = interp
            .invoke_static("Thrower", "fail", "()V", vec![])
            .unwrap_err();
        assert!(matches!(err, VmError::Thrown(Value::Str(ref s)) if &**s == "boom"));
    }

    #[test]
    fn test_arrays_and_casts() {
        let mut builder = ClassBuilder::new("Grid");
        builder
            .method(access::PUBLIC | access::STATIC, "make", "()I")
            .const_i32(2)
            .const_i32(3)
            .multi_new_array("LGrid;", 2)
            .dup()
            .instance_of_array("LGrid;", 2)
            .store(0)
            .const_i32(1)
            .load_elem()
            .array_len()
            .load(0)
            .iadd()
            .ret()
            .finish();
        let interp = interpreter_with(vec![builder]);
        let result = interp.invoke_static("Grid", "make", "()I", vec![]).unwrap();
        assert_eq!(result, Value::Int(4));
    }

    #[test]
    fn test_missing_method_is_link_error() {
        let mut builder = ClassBuilder::new("Caller");
        builder
            .method(access::PUBLIC | access::STATIC, "go", "()V")
            .invoke_static("Nowhere", "run", "()V")
            .ret_void()
            .finish();
        let interp = interpreter_with(vec![builder]);
        assert!(matches!(
            interp.invoke_static("Caller", "go", "()V", vec![]),
            Err(VmError::ClassNotFound(ref name)) if name == "Nowhere"
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let mut builder = ClassBuilder::new("Div");
        builder
            .method(access::PUBLIC | access::STATIC, "div", "(II)I")
            .load(0)
            .load(1)
            .idiv()
            .ret()
            .finish();
        let interp = interpreter_with(vec![builder]);
        assert!(matches!(
            interp.invoke_static("Div", "div", "(II)I", vec![Value::Int(1), Value::Int(0)]),
            Err(VmError::DivisionByZero)
        ));
    }
}
