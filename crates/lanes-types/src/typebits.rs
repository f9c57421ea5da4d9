use bitflags::bitflags;

bitflags! {
    /// Coarse type lattice used by type tests and type-switching.
    ///
    /// Several wire types collapse to one bit (all numerics to `NUMBER`,
    /// symbol and string to `STRING`). Wire types with no bit (clob, blob,
    /// sexp, annotation, reserved) classify as the empty set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeBits: u8 {
        /// The untyped null nibble. Typed nulls classify by their wire type.
        const NULL      = 1 << 0;
        /// `true` or `false`.
        const BOOL      = 1 << 1;
        /// Integers, floats and decimals.
        const NUMBER    = 1 << 2;
        const TIMESTAMP = 1 << 3;
        /// Symbols and strings.
        const STRING    = 1 << 4;
        const LIST      = 1 << 5;
        const STRUCT    = 1 << 6;
    }
}

/// Type bits indexed by the tag's high nibble.
pub const TYPE_BITS: [TypeBits; 16] = [
    TypeBits::NULL,      // null
    TypeBits::BOOL,      // bool
    TypeBits::NUMBER,    // positive int
    TypeBits::NUMBER,    // negative int
    TypeBits::NUMBER,    // float
    TypeBits::NUMBER,    // decimal
    TypeBits::TIMESTAMP, // timestamp
    TypeBits::STRING,    // symbol
    TypeBits::STRING,    // string
    TypeBits::empty(),   // clob
    TypeBits::empty(),   // blob
    TypeBits::LIST,      // list
    TypeBits::empty(),   // sexp
    TypeBits::STRUCT,    // struct
    TypeBits::empty(),   // annotation
    TypeBits::empty(),   // reserved
];

/// Classify a raw tag byte.
#[inline]
#[must_use]
pub const fn classify_tag(tag: u8) -> TypeBits {
    TYPE_BITS[(tag >> 4) as usize]
}

impl TypeBits {
    /// Whether any of the types in `accept` matches a value with tag `tag`.
    ///
    /// Tags that classify as the empty set never match.
    #[inline]
    #[must_use]
    pub const fn accepts_tag(self, tag: u8) -> bool {
        classify_tag(tag).intersects(self)
    }
}
