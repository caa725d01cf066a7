//! Open dispositions: the (read/write) × (append/overwrite) × (truncate)
//! tuple fixed for the lifetime of an open handle.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrWriteOrBoth {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOrOverwrite {
    Append,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateOrKeep {
    Truncate,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenDisposition {
    read_write: ReadOrWriteOrBoth,
    append: AppendOrOverwrite,
    trunc: TruncateOrKeep,
}

impl OpenDisposition {
    pub fn new(
        read_write: ReadOrWriteOrBoth,
        append: AppendOrOverwrite,
        trunc: TruncateOrKeep,
    ) -> Self {
        OpenDisposition {
            read_write,
            append,
            trunc,
        }
    }

    /// Read-write, appending at the end of the file.
    pub fn append() -> Self {
        Self::new(
            ReadOrWriteOrBoth::ReadWrite,
            AppendOrOverwrite::Append,
            TruncateOrKeep::Keep,
        )
    }

    /// Read-write, overwriting in place.
    pub fn overwrite() -> Self {
        Self::new(
            ReadOrWriteOrBoth::ReadWrite,
            AppendOrOverwrite::Overwrite,
            TruncateOrKeep::Keep,
        )
    }

    pub fn read_only() -> Self {
        Self::new(
            ReadOrWriteOrBoth::ReadOnly,
            AppendOrOverwrite::Overwrite,
            TruncateOrKeep::Keep,
        )
    }

    pub fn write_only() -> Self {
        Self::new(
            ReadOrWriteOrBoth::WriteOnly,
            AppendOrOverwrite::Append,
            TruncateOrKeep::Keep,
        )
    }

    /// Read-write, discarding existing content on open.
    pub fn truncate() -> Self {
        Self::new(
            ReadOrWriteOrBoth::ReadWrite,
            AppendOrOverwrite::Append,
            TruncateOrKeep::Truncate,
        )
    }

    pub fn read_write(&self) -> ReadOrWriteOrBoth {
        self.read_write
    }

    pub fn append_mode(&self) -> AppendOrOverwrite {
        self.append
    }

    pub fn trunc_mode(&self) -> TruncateOrKeep {
        self.trunc
    }

    pub fn readable(&self) -> bool {
        self.read_write != ReadOrWriteOrBoth::WriteOnly
    }

    pub fn writable(&self) -> bool {
        self.read_write != ReadOrWriteOrBoth::ReadOnly
    }
}
