//! Label-based intermediate representation
//!
//! IR mirrors the bytecode instruction set, except that control transfers name
//! symbolic labels, calls name functions, and operands that live in the constant
//! pool are given as literal values. Slots are plain integers and are range
//! checked during encoding.

use std::fmt;

use tern_vm_bytecode::Constant;

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// One IR instruction
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum IrInstruction {
    /// Marks the position of the next real instruction; occupies no index
    Label(String),
    Const {
        dst: u32,
        value: Constant,
    },
    LoadLocal {
        src: u32,
        dst: u32,
    },
    StoreLocal {
        src: u32,
        dst: u32,
    },
    BinOp {
        op: BinOp,
        lhs: u32,
        rhs: u32,
        dst: u32,
    },
    Compare {
        op: CompareOp,
        lhs: u32,
        rhs: u32,
        dst: u32,
    },
    Unary {
        op: UnaryOp,
        src: u32,
        dst: u32,
    },
    Jump {
        label: String,
    },
    JumpIfFalse {
        cond: u32,
        label: String,
    },
    Print {
        src: u32,
        newline: bool,
    },
    Return {
        src: Option<u32>,
    },
    NewArray {
        size: u32,
        dst: u32,
        elem_type: Option<String>,
    },
    LoadElem {
        array: u32,
        index: u32,
        dst: u32,
    },
    StoreElem {
        array: u32,
        index: u32,
        value: u32,
    },
    ArrayLength {
        array: u32,
        dst: u32,
    },
    Call {
        function: String,
        args: Vec<u32>,
        dst: Option<u32>,
    },
    CallNative {
        name: String,
        args: Vec<u32>,
        dst: Option<u32>,
    },
    GetStatic {
        class: String,
        field: String,
        dst: u32,
    },
    SetStatic {
        class: String,
        field: String,
        src: u32,
    },
    GetField {
        object: u32,
        field: String,
        dst: u32,
    },
    SetField {
        object: u32,
        field: String,
        src: u32,
    },
    NewObject {
        class: String,
        dst: u32,
    },
    TryPush {
        catch_label: String,
        catch_type: String,
    },
    TryPop,
    Throw {
        src: u32,
    },
    CatchBind {
        dst: u32,
    },
}

impl fmt::Display for IrInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(name) => write!(f, "{name}:"),
            Self::Const { dst, value } => write!(f, "CONST s{dst} = {value}"),
            Self::LoadLocal { src, dst } => write!(f, "LOAD s{dst} = s{src}"),
            Self::StoreLocal { src, dst } => write!(f, "STORE s{dst} = s{src}"),
            Self::BinOp { op, lhs, rhs, dst } => write!(f, "{op:?} s{dst} = s{lhs}, s{rhs}"),
            Self::Compare { op, lhs, rhs, dst } => write!(f, "{op:?} s{dst} = s{lhs}, s{rhs}"),
            Self::Unary { op, src, dst } => write!(f, "{op:?} s{dst} = s{src}"),
            Self::Jump { label } => write!(f, "JUMP {label}"),
            Self::JumpIfFalse { cond, label } => write!(f, "JUMP_IF_FALSE s{cond} {label}"),
            Self::Print { src, newline } => {
                write!(f, "{} s{src}", if *newline { "PRINTLN" } else { "PRINT" })
            }
            Self::Return { src: Some(src) } => write!(f, "RETURN s{src}"),
            Self::Return { src: None } => f.write_str("RETURN"),
            Self::NewArray {
                size,
                dst,
                elem_type,
            } => write!(
                f,
                "NEW_ARRAY s{dst} = {}[s{size}]",
                elem_type.as_deref().unwrap_or("num")
            ),
            Self::LoadElem { array, index, dst } => write!(f, "LOAD_ELEM s{dst} = s{array}[s{index}]"),
            Self::StoreElem {
                array,
                index,
                value,
            } => write!(f, "STORE_ELEM s{array}[s{index}] = s{value}"),
            Self::ArrayLength { array, dst } => write!(f, "ARRAY_LENGTH s{dst} = s{array}"),
            Self::Call {
                function,
                args,
                dst,
            } => write_call(f, "CALL", function, args, *dst),
            Self::CallNative { name, args, dst } => write_call(f, "CALL_NATIVE", name, args, *dst),
            Self::GetStatic { class, field, dst } => write!(f, "GET_STATIC s{dst} = {class}.{field}"),
            Self::SetStatic { class, field, src } => write!(f, "SET_STATIC {class}.{field} = s{src}"),
            Self::GetField { object, field, dst } => write!(f, "GET_FIELD s{dst} = s{object}.{field}"),
            Self::SetField { object, field, src } => write!(f, "SET_FIELD s{object}.{field} = s{src}"),
            Self::NewObject { class, dst } => write!(f, "NEW s{dst} = {class}"),
            Self::TryPush {
                catch_label,
                catch_type,
            } => write!(f, "TRY_PUSH({catch_type}) -> {catch_label}"),
            Self::TryPop => f.write_str("TRY_POP"),
            Self::Throw { src } => write!(f, "THROW s{src}"),
            Self::CatchBind { dst } => write!(f, "CATCH_BIND s{dst}"),
        }
    }
}

fn write_call(
    f: &mut fmt::Formatter<'_>,
    op: &str,
    target: &str,
    args: &[u32],
    dst: Option<u32>,
) -> fmt::Result {
    write!(f, "{op} {target} args={args:?}")?;
    if let Some(dst) = dst {
        write!(f, " -> s{dst}")?;
    }
    Ok(())
}

/// A named function body
#[derive(Debug, Clone, PartialEq)]
pub struct IrFunction {
    /// Qualified name (`Class.method`)
    pub name: String,
    /// Body, labels included
    pub instructions: Vec<IrInstruction>,
}

impl IrFunction {
    /// Create an empty function
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
        }
    }

    /// Append an instruction
    pub fn emit(&mut self, instruction: IrInstruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Define a label at the current position
    pub fn label(&mut self, name: impl Into<String>) -> &mut Self {
        self.emit(IrInstruction::Label(name.into()))
    }

    /// Number of instructions the function encodes to
    pub fn encoded_len(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| !matches!(i, IrInstruction::Label(_)))
            .count()
    }
}

/// A whole program, functions in table order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrProgram {
    /// Function table
    pub functions: Vec<IrFunction>,
}

impl IrProgram {
    /// Create an empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a function
    pub fn push(&mut self, function: IrFunction) -> &mut Self {
        self.functions.push(function);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_do_not_count() {
        let mut f = IrFunction::new("Main.main");
        f.label("top")
            .emit(IrInstruction::TryPop)
            .label("end")
            .emit(IrInstruction::Return { src: None });
        assert_eq!(f.instructions.len(), 4);
        assert_eq!(f.encoded_len(), 2);
    }

    #[test]
    fn test_display() {
        let call = IrInstruction::Call {
            function: "Main.f".into(),
            args: vec![0, 1],
            dst: Some(2),
        };
        assert_eq!(call.to_string(), "CALL Main.f args=[0, 1] -> s2");
        let push = IrInstruction::TryPush {
            catch_label: "catch0".into(),
            catch_type: "any".into(),
        };
        assert_eq!(push.to_string(), "TRY_PUSH(any) -> catch0");
    }
}
