use std::{
    ffi::{CStr, c_char, c_double, c_int, c_longlong},
    slice,
};

#[derive(Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Blob,
    Null,
    Text,
}

/// A row of a statement result, only valid until the statement advances
#[derive(Clone, Copy)]
pub struct Row {
    stmt: *mut libsqlite3_sys::sqlite3_stmt,
}

impl Row {
    pub fn new(stmt: *mut libsqlite3_sys::sqlite3_stmt) -> Self {
        Self { stmt }
    }

    pub fn column_type(&self, index: c_int) -> ColumnType {
        let column_type = unsafe { libsqlite3_sys::sqlite3_column_type(self.stmt, index) };
        match column_type {
            libsqlite3_sys::SQLITE_INTEGER => ColumnType::Integer,
            libsqlite3_sys::SQLITE_FLOAT => ColumnType::Float,
            libsqlite3_sys::SQLITE_BLOB => ColumnType::Blob,
            libsqlite3_sys::SQLITE_TEXT => ColumnType::Text,
            _ => ColumnType::Null,
        }
    }

    pub fn column_is_null(&self, index: c_int) -> bool {
        self.column_type(index) == ColumnType::Null
    }

    pub fn column_string(&self, index: c_int) -> Option<&str> {
        let data = unsafe { libsqlite3_sys::sqlite3_column_text(self.stmt, index) };
        if !data.is_null() {
            let c_str = unsafe { CStr::from_ptr(data.cast::<c_char>()) };
            return c_str.to_str().ok();
        }
        None
    }

    pub fn column_blob(&self, index: c_int) -> Option<&[u8]> {
        if self.column_type(index) != ColumnType::Blob {
            return None;
        }

        let data = unsafe { libsqlite3_sys::sqlite3_column_blob(self.stmt, index) };
        let size = unsafe { libsqlite3_sys::sqlite3_column_bytes(self.stmt, index) };
        if !data.is_null() && size > 0 {
            let data_slice = unsafe { slice::from_raw_parts(data.cast::<u8>(), size as usize) };
            return Some(data_slice);
        }
        None
    }

    pub fn column_double(&self, index: c_int) -> c_double {
        unsafe { libsqlite3_sys::sqlite3_column_double(self.stmt, index) }
    }

    pub fn column_optional_double(&self, index: c_int) -> Option<c_double> {
        if self.column_is_null(index) {
            None
        } else {
            Some(self.column_double(index))
        }
    }

    pub fn column_int(&self, index: c_int) -> c_int {
        unsafe { libsqlite3_sys::sqlite3_column_int(self.stmt, index) }
    }

    pub fn column_int64(&self, index: c_int) -> c_longlong {
        unsafe { libsqlite3_sys::sqlite3_column_int64(self.stmt, index) }
    }
}

impl Row {
    /// Integer column interpreted as a flag, any non zero value is true
    pub fn column_bool(&self, index: c_int) -> bool {
        self.column_int64(index) != 0
    }
}

#[cfg(test)]
mod tests {
    use crate::{ColumnType, Connection};

    #[test]
    fn column_values() {
        let conn = Connection::in_memory().unwrap();
        let mut stmt = conn
            .prepare_statement("SELECT 42, 1.5, 'text', x'0102', NULL, x'', 0")
            .unwrap();
        let row = stmt.next().unwrap();

        assert_eq!(row.column_type(0), ColumnType::Integer);
        assert_eq!(row.column_int64(0), 42);
        assert!(row.column_bool(0));
        assert_eq!(row.column_type(1), ColumnType::Float);
        assert_eq!(row.column_double(1), 1.5);
        assert_eq!(row.column_string(2), Some("text"));
        assert_eq!(row.column_blob(3), Some([1u8, 2].as_slice()));
        assert_eq!(row.column_blob(2), None, "text is not a blob");
        assert!(row.column_is_null(4));
        assert_eq!(row.column_optional_double(4), None);
        assert_eq!(row.column_blob(5), None);
        assert!(!row.column_bool(6));
    }
}
