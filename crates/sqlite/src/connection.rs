use crate::{AccessMode, Error, Result, Statement};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

const IN_MEMORY_PATH: &str = ":memory:";

pub struct Connection {
    db: *mut libsqlite3_sys::sqlite3,
}

impl Connection {
    pub fn new(db_path: &Path, mode: AccessMode) -> Result<Self> {
        let mut db: *mut libsqlite3_sys::sqlite3 = std::ptr::null_mut();
        let c_path = std::ffi::CString::new(db_path.to_string_lossy().to_string())?;
        let flags = access_mode_flags(mode);
        let rc = unsafe { libsqlite3_sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, std::ptr::null()) };
        if rc != libsqlite3_sys::SQLITE_OK {
            let error_message = Connection::last_sqlite_error(db);
            unsafe { libsqlite3_sys::sqlite3_close(db) };
            return Err(Error::DatabaseError(error_message));
        }
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Path::new(IN_MEMORY_PATH), AccessMode::Create)
    }

    pub fn path(&self) -> Option<String> {
        let filename = unsafe { libsqlite3_sys::sqlite3_db_filename(self.db, std::ptr::null()) };
        if !filename.is_null() {
            let c_str = unsafe { CStr::from_ptr(filename.cast::<c_char>()) };
            return Some(c_str.to_string_lossy().to_string());
        }
        None
    }

    pub fn execute(&self, sql: &str) -> Result<()> {
        let stmt = self.prepare_statement(sql)?;
        let rc = stmt.step();
        if rc == libsqlite3_sys::SQLITE_DONE || rc == libsqlite3_sys::SQLITE_ROW {
            Ok(())
        } else {
            Err(Error::DatabaseError(format!("{} ({sql})", self.last_error())))
        }
    }

    pub fn prepare_statement(&self, sql: &str) -> Result<Statement> {
        let mut stmt: *mut libsqlite3_sys::sqlite3_stmt = std::ptr::null_mut();
        let c_sql = std::ffi::CString::new(sql)?;
        let mut rc =
            unsafe { libsqlite3_sys::sqlite3_prepare_v2(self.db, c_sql.as_ptr(), -1, &mut stmt, std::ptr::null_mut()) };
        while rc == libsqlite3_sys::SQLITE_BUSY {
            sleep(Duration::from_micros(1));
            rc = unsafe {
                libsqlite3_sys::sqlite3_prepare_v2(self.db, c_sql.as_ptr(), -1, &mut stmt, std::ptr::null_mut())
            };
        }
        if rc != libsqlite3_sys::SQLITE_OK {
            return Err(Error::DatabaseError(format!("{} ({sql})", self.last_error())));
        }

        Ok(Statement::new(stmt))
    }

    pub fn execute_sql_statements(&self, sql_contents: &str) -> Result<()> {
        let lines = sql_contents
            .split(';')
            .map(|line| line.trim())
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect::<Vec<&str>>();
        for line in lines {
            self.execute(line)?;
        }
        Ok(())
    }

    /// Runs a query and returns the first column of the first row as text
    pub fn query_string(&self, sql: &str) -> Result<Option<String>> {
        let mut stmt = self.prepare_statement(sql)?;
        Ok(stmt.next_row()?.and_then(|row| row.column_string(0).map(str::to_string)))
    }

    /// Runs a query and returns the first column of the first row as integer
    pub fn query_int64(&self, sql: &str) -> Result<Option<i64>> {
        let mut stmt = self.prepare_statement(sql)?;
        Ok(stmt
            .next_row()?
            .and_then(|row| if row.column_is_null(0) { None } else { Some(row.column_int64(0)) }))
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.execute("BEGIN")
    }

    pub fn commit(&self) -> Result<()> {
        self.execute("COMMIT")
    }

    pub fn rollback(&self) -> Result<()> {
        self.execute("ROLLBACK")
    }

    /// True when no explicit transaction is active on this connection
    pub fn is_autocommit(&self) -> bool {
        unsafe { libsqlite3_sys::sqlite3_get_autocommit(self.db) != 0 }
    }

    pub fn pragma(&self, name: &str) -> Result<Option<String>> {
        self.query_string(&format!("PRAGMA {name}"))
    }

    pub fn set_pragma(&self, name: &str, value: &str) -> Result<()> {
        log::debug!("PRAGMA {name}={value}");
        self.execute(&format!("PRAGMA {name}={value}"))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let mut stmt = self.prepare_statement("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        stmt.bind_text(1, table)?;
        Ok(stmt.next_row()?.is_some_and(|row| row.column_int64(0) > 0))
    }

    pub fn column_exists(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self.prepare_statement(&format!("PRAGMA table_info({})", crate::quote_identifier(table)))?;
        let names = stmt.map_rows(|row| row.column_string(1).map(str::to_string))?;
        Ok(names.into_iter().flatten().any(|name| name.eq_ignore_ascii_case(column)))
    }

    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { libsqlite3_sys::sqlite3_last_insert_rowid(self.db) }
    }

    /// Number of rows modified by the most recent statement
    pub fn changes(&self) -> i32 {
        unsafe { libsqlite3_sys::sqlite3_changes(self.db) }
    }

    pub fn last_error(&self) -> String {
        Connection::last_sqlite_error(self.db)
    }

    fn last_sqlite_error(db: *mut libsqlite3_sys::sqlite3) -> String {
        let error_message = unsafe { libsqlite3_sys::sqlite3_errmsg(db) };
        let c_str = unsafe { CStr::from_ptr(error_message) };
        c_str.to_string_lossy().into_owned()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe { libsqlite3_sys::sqlite3_close(self.db) };
    }
}

fn access_mode_flags(mode: AccessMode) -> c_int {
    match mode {
        AccessMode::ReadOnly => libsqlite3_sys::SQLITE_OPEN_READONLY,
        AccessMode::ReadWrite => libsqlite3_sys::SQLITE_OPEN_READWRITE,
        AccessMode::Create => libsqlite3_sys::SQLITE_OPEN_READWRITE | libsqlite3_sys::SQLITE_OPEN_CREATE,
    }
}
