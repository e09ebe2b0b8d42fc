//! Value types, type masks and the packed variable flags operand.

use std::fmt;

use bitflags::bitflags;

/// Type of a stack value or variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MjoType {
    Int = 0,
    Float = 1,
    String = 2,
    IntArray = 3,
    FloatArray = 4,
    StringArray = 5,
    /// Result of a merge between disagreeing types, or of an untyped push.
    Unknown = 255,
}

impl MjoType {
    /// Decode a type tag as stored in type lists and flags. `Unknown` is never
    /// stored in a file, so it is not accepted here.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Int,
            1 => Self::Float,
            2 => Self::String,
            3 => Self::IntArray,
            4 => Self::FloatArray,
            5 => Self::StringArray,
            _ => return None,
        })
    }

    pub fn mask(self) -> TypeMask {
        match self {
            Self::Int => TypeMask::INT,
            Self::Float => TypeMask::FLOAT,
            Self::String => TypeMask::STRING,
            Self::IntArray => TypeMask::INT_ARRAY,
            Self::FloatArray => TypeMask::FLOAT_ARRAY,
            Self::StringArray => TypeMask::STRING_ARRAY,
            Self::Unknown => TypeMask::ALL,
        }
    }

    /// `Unknown` matches every mask.
    pub fn matches(self, mask: TypeMask) -> bool {
        self == Self::Unknown || mask.intersects(self.mask())
    }

    /// Element type of an array type. Anything else has no known element type.
    pub fn element_type(self) -> MjoType {
        match self {
            Self::IntArray => Self::Int,
            Self::FloatArray => Self::Float,
            Self::StringArray => Self::String,
            _ => Self::Unknown,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::IntArray => "intarray",
            Self::FloatArray => "floatarray",
            Self::StringArray => "stringarray",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "int" => Self::Int,
            "float" => Self::Float,
            "string" => Self::String,
            "intarray" => Self::IntArray,
            "floatarray" => Self::FloatArray,
            "stringarray" => Self::StringArray,
            _ => return None,
        })
    }
}

impl fmt::Display for MjoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

bitflags! {
    /// Set of types accepted by a stack pop.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TypeMask: u8 {
        const INT = 1 << 0;
        const FLOAT = 1 << 1;
        const STRING = 1 << 2;
        const INT_ARRAY = 1 << 3;
        const FLOAT_ARRAY = 1 << 4;
        const STRING_ARRAY = 1 << 5;

        const NUMERIC = Self::INT.bits() | Self::FLOAT.bits();
        const PRIMITIVE = Self::NUMERIC.bits() | Self::STRING.bits();
        const ARRAY = Self::INT_ARRAY.bits() | Self::FLOAT_ARRAY.bits() | Self::STRING_ARRAY.bits();
        const ALL = Self::PRIMITIVE.bits() | Self::ARRAY.bits();
    }
}

/// Storage class of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Persistent,
    SaveFile,
    Thread,
    Local,
}

impl Scope {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::SaveFile => "savefile",
            Self::Thread => "thread",
            Self::Local => "local",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "persist" | "persistent" => Self::Persistent,
            "save" | "savefile" => Self::SaveFile,
            "thread" => Self::Thread,
            "local" => Self::Local,
            _ => return None,
        })
    }

    /// Sigil used in decompiled identifiers.
    pub fn sigil(self) -> char {
        match self {
            Self::Persistent => '#',
            Self::SaveFile => '@',
            Self::Thread => '%',
            Self::Local => '_',
        }
    }
}

/// Unary operator applied to a loaded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvertMode {
    None,
    Numeric,
    Boolean,
    Bitwise,
}

impl InvertMode {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Numeric => Some("invert_numeric"),
            Self::Boolean => Some("invert_boolean"),
            Self::Bitwise => Some("invert_bitwise"),
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "invert_numeric" | "neg" => Self::Numeric,
            "invert_boolean" | "notl" => Self::Boolean,
            "invert_bitwise" | "not" => Self::Bitwise,
            _ => return None,
        })
    }
}

/// Increment/decrement applied around a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifier {
    None,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl Modifier {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::PreIncrement => Some("preinc"),
            Self::PreDecrement => Some("predec"),
            Self::PostIncrement => Some("postinc"),
            Self::PostDecrement => Some("postdec"),
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "preinc" | "incx" => Self::PreIncrement,
            "predec" | "decx" => Self::PreDecrement,
            "postinc" | "xinc" => Self::PostIncrement,
            "postdec" | "xdec" => Self::PostDecrement,
            _ => return None,
        })
    }
}

/// Packed 16-bit variable flags (`f` operand).
///
/// Layout, low to high: modifier (3 bits), invert mode (2), scope (3),
/// type (3), dimension (2). Unused or out-of-range bit patterns are kept
/// verbatim so that re-encoding is byte-exact.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

impl Flags {
    const MODIFIER_MASK: u16 = 0b0000_0000_0000_0111;
    const INVERT_MASK: u16 = 0b0000_0000_0001_1000;
    const SCOPE_MASK: u16 = 0b0000_0000_1110_0000;
    const TYPE_MASK: u16 = 0b0000_0111_0000_0000;
    const DIM_MASK: u16 = 0b0001_1000_0000_0000;

    pub fn new(
        ty: MjoType,
        scope: Scope,
        modifier: Modifier,
        invert: InvertMode,
        dimension: u8,
    ) -> Self {
        let ty = match ty {
            MjoType::Unknown => 0,
            other => other as u16,
        };
        Flags(
            ((dimension as u16) << 11 & Self::DIM_MASK)
                | (ty << 8 & Self::TYPE_MASK)
                | ((scope as u16) << 5)
                | ((invert as u16) << 3)
                | modifier as u16,
        )
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn dimension(self) -> u8 {
        ((self.0 & Self::DIM_MASK) >> 11) as u8
    }

    pub fn ty(self) -> MjoType {
        MjoType::from_u8(((self.0 & Self::TYPE_MASK) >> 8) as u8).unwrap_or(MjoType::Unknown)
    }

    pub fn scope(self) -> Scope {
        match (self.0 & Self::SCOPE_MASK) >> 5 {
            0 => Scope::Persistent,
            1 => Scope::SaveFile,
            2 => Scope::Thread,
            _ => Scope::Local,
        }
    }

    pub fn invert(self) -> InvertMode {
        match (self.0 & Self::INVERT_MASK) >> 3 {
            0 => InvertMode::None,
            1 => InvertMode::Numeric,
            2 => InvertMode::Boolean,
            _ => InvertMode::Bitwise,
        }
    }

    pub fn modifier(self) -> Modifier {
        match self.0 & Self::MODIFIER_MASK {
            1 => Modifier::PreIncrement,
            2 => Modifier::PreDecrement,
            3 => Modifier::PostIncrement,
            4 => Modifier::PostDecrement,
            _ => Modifier::None,
        }
    }

    /// Keyword spelling used by the assembly text form.
    pub fn keywords(self) -> Vec<&'static str> {
        let mut words = vec![self.scope().keyword(), self.ty().keyword()];
        words.extend(self.invert().keyword());
        words.extend(self.modifier().keyword());
        match self.dimension() {
            1 => words.push("dim1"),
            2 => words.push("dim2"),
            3 => words.push("dim3"),
            _ => {}
        }
        words
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flags({:#06x}: {})", self.0, self.keywords().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack() {
        let flags = Flags::new(
            MjoType::StringArray,
            Scope::Local,
            Modifier::PostDecrement,
            InvertMode::Boolean,
            2,
        );
        assert_eq!(flags.ty(), MjoType::StringArray);
        assert_eq!(flags.scope(), Scope::Local);
        assert_eq!(flags.modifier(), Modifier::PostDecrement);
        assert_eq!(flags.invert(), InvertMode::Boolean);
        assert_eq!(flags.dimension(), 2);
        assert_eq!(flags.bits(), 0x1000 | 0x0500 | 0x0060 | 0x0010 | 0x0004);
    }

    #[test]
    fn unknown_matches_everything() {
        assert!(MjoType::Unknown.matches(TypeMask::INT));
        assert!(MjoType::Unknown.matches(TypeMask::STRING_ARRAY));
        assert!(MjoType::Float.matches(TypeMask::NUMERIC));
        assert!(!MjoType::String.matches(TypeMask::NUMERIC));
        assert!(!MjoType::IntArray.matches(TypeMask::PRIMITIVE));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(MjoType::from_keyword("IntArray"), Some(MjoType::IntArray));
        assert_eq!(Scope::from_keyword("persist"), Some(Scope::Persistent));
        assert_eq!(Modifier::from_keyword("xinc"), Some(Modifier::PostIncrement));
        assert_eq!(InvertMode::from_keyword("not"), Some(InvertMode::Bitwise));
    }
}
