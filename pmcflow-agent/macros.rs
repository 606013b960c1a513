//! Declarative macros shared across the pmcflow codebase

/// Define a fieldless enum with automatic `name()` and `all()` implementations
///
/// # Example
/// ```
/// use pmcflow::metric_enum;
///
/// metric_enum! {
///     pub enum Domain {
///         Core => "core",
///         L3 => "l3",
///     }
/// }
///
/// assert_eq!(Domain::L3.name(), "l3");
/// assert_eq!(Domain::all().len(), 2);
/// ```
///
/// Expands to:
/// - An enum with Debug, Clone, Copy, PartialEq, Eq, Hash derives
/// - A `name(&self) -> &'static str` method
/// - An `all() -> Vec<Self>` method
#[macro_export]
macro_rules! metric_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $str:literal),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)*
                }
            }

            pub fn all() -> Vec<$name> {
                vec![$($name::$variant,)*]
            }
        }
    };
}
