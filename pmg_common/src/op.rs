/// Implements the standard arithmetic traits for a single-field tuple struct by forwarding to the
/// inner value.
#[macro_export]
macro_rules! op {
    (binary $type:ident, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $f(self, rhs: Self) -> Self::Output {
                Self(std::ops::$trait::$f(self.0, rhs.0))
            }
        }
    };
    (inplace $type:ident, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $type {
            fn $f(&mut self, rhs: Self) {
                std::ops::$trait::$f(&mut self.0, rhs.0)
            }
        }
    };
    (unary $type:ident, $trait:ident, $f:ident) => {
        impl std::ops::$trait for $type {
            type Output = Self;

            fn $f(self) -> Self::Output {
                Self(std::ops::$trait::$f(self.0))
            }
        }
    };
}
