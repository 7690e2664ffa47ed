use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::def::MethodSig;
use crate::sig::TypeSig;
use crate::{FieldDefId, MethodDefId};

/// Reference to a method from an instruction operand or an explicit override.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodRef {
  /// Direct definition handle. The declaring type is taken with its own
  /// placeholders, which the referencing context then substitutes.
  Def(MethodDefId),
  /// Member of a (possibly generic) type, matched by name and signature.
  Member {
    parent: TypeSig,
    name: String,
    sig: MethodSig,
  },
  /// Generic method instantiation.
  Spec {
    method: Box<MethodRef>,
    args: Vec<TypeSig>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldRef {
  Def(FieldDefId),
  Member { parent: TypeSig, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
  Nop,
  Ldarg,
  Ldarga,
  Starg,
  Ldloc,
  Ldloca,
  Stloc,
  Ldnull,
  LdcI4,
  LdcI8,
  LdcR8,
  Ldstr,
  Dup,
  Pop,
  Call,
  Callvirt,
  Newobj,
  Ldftn,
  Ldvirtftn,
  Ret,
  Throw,
  Rethrow,
  Br,
  Brtrue,
  Brfalse,
  Beq,
  Bne,
  Blt,
  Ble,
  Bgt,
  Bge,
  Switch,
  Leave,
  Endfinally,
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  And,
  Or,
  Xor,
  Shl,
  Shr,
  Neg,
  Not,
  Ceq,
  Cgt,
  Clt,
  ConvI4,
  ConvI8,
  ConvR8,
  Ldfld,
  Ldflda,
  Stfld,
  Ldsfld,
  Ldsflda,
  Stsfld,
  Box,
  Unbox,
  UnboxAny,
  Isinst,
  Castclass,
  Newarr,
  Ldlen,
  Ldelem,
  Ldelema,
  Stelem,
  Initobj,
  Ldtoken,
  Sizeof,
  Constrained,
}

impl OpCode {
  pub fn is_branch(&self) -> bool {
    matches!(
      self,
      OpCode::Br
        | OpCode::Brtrue
        | OpCode::Brfalse
        | OpCode::Beq
        | OpCode::Bne
        | OpCode::Blt
        | OpCode::Ble
        | OpCode::Bgt
        | OpCode::Bge
        | OpCode::Switch
        | OpCode::Leave
    )
  }

  pub fn mnemonic(&self) -> &'static str {
    match self {
      OpCode::Nop => "nop",
      OpCode::Ldarg => "ldarg",
      OpCode::Ldarga => "ldarga",
      OpCode::Starg => "starg",
      OpCode::Ldloc => "ldloc",
      OpCode::Ldloca => "ldloca",
      OpCode::Stloc => "stloc",
      OpCode::Ldnull => "ldnull",
      OpCode::LdcI4 => "ldc.i4",
      OpCode::LdcI8 => "ldc.i8",
      OpCode::LdcR8 => "ldc.r8",
      OpCode::Ldstr => "ldstr",
      OpCode::Dup => "dup",
      OpCode::Pop => "pop",
      OpCode::Call => "call",
      OpCode::Callvirt => "callvirt",
      OpCode::Newobj => "newobj",
      OpCode::Ldftn => "ldftn",
      OpCode::Ldvirtftn => "ldvirtftn",
      OpCode::Ret => "ret",
      OpCode::Throw => "throw",
      OpCode::Rethrow => "rethrow",
      OpCode::Br => "br",
      OpCode::Brtrue => "brtrue",
      OpCode::Brfalse => "brfalse",
      OpCode::Beq => "beq",
      OpCode::Bne => "bne.un",
      OpCode::Blt => "blt",
      OpCode::Ble => "ble",
      OpCode::Bgt => "bgt",
      OpCode::Bge => "bge",
      OpCode::Switch => "switch",
      OpCode::Leave => "leave",
      OpCode::Endfinally => "endfinally",
      OpCode::Add => "add",
      OpCode::Sub => "sub",
      OpCode::Mul => "mul",
      OpCode::Div => "div",
      OpCode::Rem => "rem",
      OpCode::And => "and",
      OpCode::Or => "or",
      OpCode::Xor => "xor",
      OpCode::Shl => "shl",
      OpCode::Shr => "shr",
      OpCode::Neg => "neg",
      OpCode::Not => "not",
      OpCode::Ceq => "ceq",
      OpCode::Cgt => "cgt",
      OpCode::Clt => "clt",
      OpCode::ConvI4 => "conv.i4",
      OpCode::ConvI8 => "conv.i8",
      OpCode::ConvR8 => "conv.r8",
      OpCode::Ldfld => "ldfld",
      OpCode::Ldflda => "ldflda",
      OpCode::Stfld => "stfld",
      OpCode::Ldsfld => "ldsfld",
      OpCode::Ldsflda => "ldsflda",
      OpCode::Stsfld => "stsfld",
      OpCode::Box => "box",
      OpCode::Unbox => "unbox",
      OpCode::UnboxAny => "unbox.any",
      OpCode::Isinst => "isinst",
      OpCode::Castclass => "castclass",
      OpCode::Newarr => "newarr",
      OpCode::Ldlen => "ldlen",
      OpCode::Ldelem => "ldelem",
      OpCode::Ldelema => "ldelema",
      OpCode::Stelem => "stelem",
      OpCode::Initobj => "initobj",
      OpCode::Ldtoken => "ldtoken",
      OpCode::Sizeof => "sizeof",
      OpCode::Constrained => "constrained.",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operand {
  #[default]
  None,
  Int32(i32),
  Int64(i64),
  Float(OrderedFloat<f64>),
  String(String),
  Local(u16),
  Arg(u16),
  /// Target instruction index.
  Branch(usize),
  Switch(Vec<usize>),
  Method(MethodRef),
  Field(FieldRef),
  Type(TypeSig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
  pub opcode: OpCode,
  #[serde(default)]
  pub operand: Operand,
}

impl Instruction {
  pub fn new(
    opcode: OpCode,
    operand: Operand,
  ) -> Self {
    Self { opcode, operand }
  }

  pub fn simple(opcode: OpCode) -> Self {
    Self {
      opcode,
      operand: Operand::None,
    }
  }

  /// Instruction indices this instruction may jump to.
  pub fn branch_targets(&self) -> Vec<usize> {
    match &self.operand {
      Operand::Branch(target) => vec![*target],
      Operand::Switch(targets) => targets.clone(),
      _ => Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
  Catch,
  Filter,
  Finally,
  Fault,
}

/// Protected region; all bounds are instruction indices, ends exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
  pub kind: HandlerKind,
  pub try_start: usize,
  pub try_end: usize,
  pub handler_start: usize,
  pub handler_end: usize,
  #[serde(default)]
  pub filter_start: Option<usize>,
  #[serde(default)]
  pub catch_type: Option<TypeSig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodBody {
  #[serde(default)]
  pub locals: Vec<TypeSig>,
  pub instructions: Vec<Instruction>,
  #[serde(default)]
  pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
  pub fn new(instructions: Vec<Instruction>) -> Self {
    Self {
      locals: Vec::new(),
      instructions,
      handlers: Vec::new(),
    }
  }
}
