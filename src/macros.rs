/// Builds a `Vec<ParameterDescriptor>`.
///
/// ```
/// use rpcmirror::params;
///
/// let ps = params![a: "i64", b: "i64" = 1, &mut log, label];
/// assert_eq!(ps.len(), 4);
/// assert!(ps[1].has_default());
/// assert!(ps[2].by_reference);
/// ```
#[macro_export]
macro_rules! params {
    (@push $params:ident;) => {};
    (@push $params:ident; &mut $name:ident $(: $ty:literal)? $(= $default:expr)? $(, $($rest:tt)*)?) => {
        $params.push($crate::params!(@one $name $(: $ty)? $(= $default)?).by_reference());
        $crate::params!(@push $params; $($($rest)*)?);
    };
    (@push $params:ident; $name:ident $(: $ty:literal)? $(= $default:expr)? $(, $($rest:tt)*)?) => {
        $params.push($crate::params!(@one $name $(: $ty)? $(= $default)?));
        $crate::params!(@push $params; $($($rest)*)?);
    };
    (@one $name:ident $(: $ty:literal)? $(= $default:expr)?) => {
        $crate::ParameterDescriptor::new(stringify!($name)) $(.typed($ty))? $(.default_value($default))?
    };
    () => {
        ::std::vec::Vec::<$crate::ParameterDescriptor>::new()
    };
    ($($body:tt)+) => {{
        let mut params = ::std::vec::Vec::<$crate::ParameterDescriptor>::new();
        $crate::params!(@push params; $($body)+);
        params
    }};
}

/// Shorthand for a `Result::Err(Failure)` built from a format string.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)*) => {
        ::std::result::Result::Err($crate::Failure::new(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use crate::{Failure, Value};

    #[test]
    fn params_macro_captures_shape() {
        let ps = params![a: "i64", b = 2i64, &mut out: "Vec<String>", c];
        let names: Vec<_> = ps.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "out", "c"]);
        assert_eq!(ps[0].ty.as_deref(), Some("i64"));
        assert_eq!(ps[1].default.as_ref().unwrap().decode().unwrap(), Value::Int(2));
        assert!(ps[2].by_reference);
        assert!(!ps[3].by_reference && ps[3].ty.is_none() && !ps[3].has_default());
        assert!(params![].is_empty());
    }

    #[test]
    fn fail_macro_builds_failure() {
        let r: Result<Value, Failure> = fail!("bad {}", 7);
        assert_eq!(r.unwrap_err().message, "bad 7");
    }
}
