//! Numbering of the built-in modules every device exposes.
//!
//! Standard invocations address these by index; the user bit is never set.
//! Push and pull calls receive two trailing arguments appended by the
//! device, `(Pointer swap, Int32 length)`, describing the bulk buffer.

/// Device information.
pub mod sys {
    pub const MODULE: u16 = 0;
    /// `() -> int32`: the device identifier
    pub const PING: u8 = 0;
    /// `() -> int16`: the device version
    pub const VERSION: u8 = 1;
    /// `() -> int32`: number of loaded user modules
    pub const MODULE_COUNT: u8 = 2;
    pub const FUNCTIONS: &[&str] = &["ping", "version", "module_count"];
}

/// Loader front end.
pub mod fld {
    pub const MODULE: u16 = 1;
    /// `(int16 identifier) -> int32`: registry slot of a loaded module
    pub const INDEX: u8 = 0;
    /// `(ptr image) -> int32`: load a staged image; slot index or task id
    pub const LOAD: u8 = 1;
    /// `(int16 slot) -> int32`: release a loaded module
    pub const RELEASE: u8 = 2;
    pub const FUNCTIONS: &[&str] = &["index", "load", "release"];
}

/// Device memory staging.
pub mod ram {
    pub const MODULE: u16 = 2;
    /// push: keep the received buffer, returns its device address
    pub const LOAD: u8 = 0;
    /// pull `(ptr address)`: copy device memory into the bulk buffer
    pub const READ: u8 = 1;
    /// `(ptr address) -> int32`: free a staged buffer
    pub const FREE: u8 = 2;
    pub const FUNCTIONS: &[&str] = &["load", "read", "free"];
}

/// Names of the standard modules, indexed by module number.
pub const MODULES: &[(&str, &[&str])] = &[
    ("sys", sys::FUNCTIONS),
    ("fld", fld::FUNCTIONS),
    ("ram", ram::FUNCTIONS),
];

/// Resolve `module.function` names to standard indices.
pub fn resolve(module: &str, function: &str) -> Option<(u16, u8)> {
    let (index, (_, functions)) = MODULES
        .iter()
        .enumerate()
        .find(|(_, (name, _))| *name == module)?;
    let function = functions.iter().position(|f| *f == function)?;
    Some((index as u16, function as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_matches_constants() {
        assert_eq!(resolve("sys", "ping"), Some((sys::MODULE, sys::PING)));
        assert_eq!(resolve("fld", "release"), Some((fld::MODULE, fld::RELEASE)));
        assert_eq!(resolve("ram", "read"), Some((ram::MODULE, ram::READ)));
        assert_eq!(resolve("ram", "write"), None);
        assert_eq!(resolve("gpio", "write"), None);
    }
}
