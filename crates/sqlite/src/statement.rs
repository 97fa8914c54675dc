use crate::{Error, Result, Row};
use std::ffi::{CStr, c_double, c_int, c_longlong};

pub struct Statement {
    stmt: *mut libsqlite3_sys::sqlite3_stmt,
    last_rc: c_int,
}

impl Statement {
    pub fn new(stmt: *mut libsqlite3_sys::sqlite3_stmt) -> Self {
        Self {
            stmt,
            last_rc: libsqlite3_sys::SQLITE_OK,
        }
    }

    pub fn bind(&self, index: c_int, value: c_int) -> Result<()> {
        self.check_rc(unsafe { libsqlite3_sys::sqlite3_bind_int(self.stmt, index, value) })?;
        Ok(())
    }

    pub fn bind_int64(&self, index: c_int, value: c_longlong) -> Result<()> {
        self.check_rc(unsafe { libsqlite3_sys::sqlite3_bind_int64(self.stmt, index, value) })?;
        Ok(())
    }

    pub fn bind_double(&self, index: c_int, value: c_double) -> Result<()> {
        self.check_rc(unsafe { libsqlite3_sys::sqlite3_bind_double(self.stmt, index, value) })?;
        Ok(())
    }

    pub fn bind_optional_double(&self, index: c_int, value: Option<c_double>) -> Result<()> {
        match value {
            Some(value) => self.bind_double(index, value),
            None => self.bind_null(index),
        }
    }

    pub fn bind_text(&self, index: c_int, value: &str) -> Result<()> {
        let c_str = std::ffi::CString::new(value)?;
        self.check_rc(unsafe {
            libsqlite3_sys::sqlite3_bind_text(self.stmt, index, c_str.as_ptr(), -1, libsqlite3_sys::SQLITE_TRANSIENT())
        })?;
        Ok(())
    }

    pub fn bind_null(&self, index: c_int) -> Result<()> {
        self.check_rc(unsafe { libsqlite3_sys::sqlite3_bind_null(self.stmt, index) })?;
        Ok(())
    }

    /// Binds a copy of the blob, the slice does not need to outlive the statement
    pub fn bind_blob(&self, index: c_int, value: &[u8]) -> Result<()> {
        self.check_rc(unsafe {
            libsqlite3_sys::sqlite3_bind_blob(
                self.stmt,
                index,
                value.as_ptr().cast::<std::ffi::c_void>(),
                value.len() as c_int,
                libsqlite3_sys::SQLITE_TRANSIENT(),
            )
        })?;
        Ok(())
    }

    pub fn bind_optional_blob(&self, index: c_int, value: Option<&[u8]>) -> Result<()> {
        match value {
            Some(value) => self.bind_blob(index, value),
            None => self.bind_null(index),
        }
    }

    /// Resets the statement and clears the bindings so it can be reused
    pub fn reset(&self) -> Result<()> {
        unsafe { libsqlite3_sys::sqlite3_reset(self.stmt) };
        self.check_rc(unsafe { libsqlite3_sys::sqlite3_clear_bindings(self.stmt) })?;
        Ok(())
    }

    pub fn step(&self) -> c_int {
        let mut rc = unsafe { libsqlite3_sys::sqlite3_step(self.stmt) };
        while rc == libsqlite3_sys::SQLITE_BUSY {
            std::thread::sleep(std::time::Duration::from_micros(1));
            rc = unsafe { libsqlite3_sys::sqlite3_step(self.stmt) };
        }
        rc
    }

    /// Runs a statement that produces no rows (insert, update, ddl) and resets it afterwards
    pub fn execute(&self) -> Result<()> {
        let rc = self.step();
        let result = if rc == libsqlite3_sys::SQLITE_DONE || rc == libsqlite3_sys::SQLITE_ROW {
            Ok(())
        } else {
            Err(Error::DatabaseError(self.error_message()))
        };

        unsafe { libsqlite3_sys::sqlite3_reset(self.stmt) };
        result
    }

    /// Steps to the next row, `None` once all rows were produced
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.advance() {
            Ok(Some(Row::new(self.stmt)))
        } else {
            self.finish().map(|_| None)
        }
    }

    /// Collects the remaining rows, a step that fails midway is an error rather than the end of the rows
    pub fn map_rows<T>(&mut self, mut f: impl FnMut(&Row) -> T) -> Result<Vec<T>> {
        let mut result = Vec::new();
        while let Some(row) = self.next_row()? {
            result.push(f(&row));
        }
        Ok(result)
    }

    /// Checks how the last step ended, iterating stops on errors as well as on the last row
    pub fn finish(&self) -> Result<()> {
        match self.last_rc {
            libsqlite3_sys::SQLITE_OK | libsqlite3_sys::SQLITE_ROW | libsqlite3_sys::SQLITE_DONE => Ok(()),
            _ => Err(Error::DatabaseError(self.error_message())),
        }
    }

    fn advance(&mut self) -> bool {
        if self.stmt.is_null() {
            return false;
        }

        self.last_rc = self.step();
        self.last_rc == libsqlite3_sys::SQLITE_ROW
    }

    fn error_message(&self) -> String {
        let error_message = unsafe { libsqlite3_sys::sqlite3_errmsg(libsqlite3_sys::sqlite3_db_handle(self.stmt)) };
        let c_str = unsafe { CStr::from_ptr(error_message) };

        c_str.to_string_lossy().into_owned()
    }

    fn check_rc(&self, rc: c_int) -> Result<c_int> {
        if rc != libsqlite3_sys::SQLITE_OK && (rc != libsqlite3_sys::SQLITE_ROW && rc != libsqlite3_sys::SQLITE_DONE) {
            return Err(Error::DatabaseError(self.error_message()));
        }

        Ok(rc)
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        unsafe { libsqlite3_sys::sqlite3_finalize(self.stmt) };
    }
}

impl Iterator for Statement {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() { Some(Row::new(self.stmt)) } else { None }
    }
}
