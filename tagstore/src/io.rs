use std::fs::File;
use std::io;
use std::ops::Deref;

/// The contents of a trace file, either memory mapped or read into memory
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Buffered(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(m) => m,
            TraceBytes::Buffered(b) => b,
        }
    }
}

/// Gets the bytes of a trace file
///
/// On unix the file is memory mapped and the OS is advised that it will be read sequentially,
/// which the simulator guarantees. Elsewhere it is read into memory
pub fn get_trace(file: File) -> io::Result<TraceBytes> {
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        // Safety: the trace is only read, and isn't expected to be modified while simulating
        let m = unsafe { Mmap::map(&file)? };
        m.advise(Advice::Sequential)?;
        Ok(TraceBytes::Mapped(m))
    }
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut buf = Vec::new();
        io::BufReader::new(file).read_to_end(&mut buf)?;
        Ok(TraceBytes::Buffered(buf))
    }
}
