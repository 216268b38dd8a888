use core::fmt;

/// One of the sixteen core registers.
///
/// R13 is the stack pointer visible through `CONTROL.SPSEL` banking, R14 the
/// link register and R15 the program counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RegisterId {
    R0 = 0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
}

impl RegisterId {
    /// All registers in index order, `r0` first.
    pub const ALL: [RegisterId; 16] = [
        RegisterId::R0,
        RegisterId::R1,
        RegisterId::R2,
        RegisterId::R3,
        RegisterId::R4,
        RegisterId::R5,
        RegisterId::R6,
        RegisterId::R7,
        RegisterId::R8,
        RegisterId::R9,
        RegisterId::R10,
        RegisterId::R11,
        RegisterId::R12,
        RegisterId::Sp,
        RegisterId::Lr,
        RegisterId::Pc,
    ];

    /// Maps a 4-bit register field to its id. Values above 15 return `None`.
    pub fn from_index(index: u32) -> Option<RegisterId> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_sp(self) -> bool {
        self == RegisterId::Sp
    }

    pub fn is_pc(self) -> bool {
        self == RegisterId::Pc
    }

    /// True for r13 and r15, the registers most encodings forbid.
    pub fn is_sp_or_pc(self) -> bool {
        self.is_sp() || self.is_pc()
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterId::Sp => f.write_str("sp"),
            RegisterId::Lr => f.write_str("lr"),
            RegisterId::Pc => f.write_str("pc"),
            other => write!(f, "r{}", other.index()),
        }
    }
}

/// Register bitmap used by LDM/STM/PUSH/POP, bit k = `r<k>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterList(pub u16);

impl RegisterList {
    pub fn contains(self, reg: RegisterId) -> bool {
        self.0 & (1 << reg.index()) != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The lowest-numbered register in the list, if any.
    pub fn lowest(self) -> Option<RegisterId> {
        if self.0 == 0 {
            None
        } else {
            RegisterId::from_index(self.0.trailing_zeros())
        }
    }

    /// Iterates the registers in ascending index order, the order in which
    /// LDM/STM transfer them.
    pub fn iter(self) -> impl Iterator<Item = RegisterId> {
        RegisterId::ALL
            .into_iter()
            .filter(move |r| self.contains(*r))
    }
}

impl fmt::Display for RegisterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let mut first = true;
        for reg in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{reg}")?;
            first = false;
        }
        f.write_str("}")
    }
}
