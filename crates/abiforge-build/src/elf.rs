//! Minimal ELF header and program header reader.
//!
//! Only the fields the verifier needs: object type, machine, and the
//! alignment of loadable segments. Works on raw bytes so it runs the same
//! on every host, with no inspection tool installed.

/// `e_type` for a fixed-address executable.
pub const ET_EXEC: u16 = 2;
/// `e_type` for a shared object or position-independent executable.
pub const ET_DYN: u16 = 3;

const PT_LOAD: u32 = 1;
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF file class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

/// The parts of an ELF header the verifier reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub class: ElfClass,
    pub little_endian: bool,
    /// `e_type`.
    pub object_type: u16,
    /// `e_machine`.
    pub machine: u16,
    phoff: u64,
    phentsize: u16,
    phnum: u16,
}

struct Reader<'a> {
    bytes: &'a [u8],
    little_endian: bool,
}

impl Reader<'_> {
    fn u16(&self, at: usize) -> Option<u16> {
        let b: [u8; 2] = self.bytes.get(at..at + 2)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(b)
        } else {
            u16::from_be_bytes(b)
        })
    }

    fn u32(&self, at: usize) -> Option<u32> {
        let b: [u8; 4] = self.bytes.get(at..at + 4)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn u64(&self, at: usize) -> Option<u64> {
        let b: [u8; 8] = self.bytes.get(at..at + 8)?.try_into().ok()?;
        Some(if self.little_endian {
            u64::from_le_bytes(b)
        } else {
            u64::from_be_bytes(b)
        })
    }
}

/// Parse the ELF header. `None` for anything that is not a well-formed
/// 32- or 64-bit ELF header.
pub fn parse_header(bytes: &[u8]) -> Option<ElfHeader> {
    if bytes.get(0..4)? != ELF_MAGIC {
        return None;
    }
    let class = match *bytes.get(4)? {
        1 => ElfClass::Elf32,
        2 => ElfClass::Elf64,
        _ => return None,
    };
    let little_endian = match *bytes.get(5)? {
        1 => true,
        2 => false,
        _ => return None,
    };
    let r = Reader {
        bytes,
        little_endian,
    };

    let (phoff, phentsize, phnum) = match class {
        ElfClass::Elf64 => (r.u64(32)?, r.u16(54)?, r.u16(56)?),
        ElfClass::Elf32 => (u64::from(r.u32(28)?), r.u16(42)?, r.u16(44)?),
    };

    Some(ElfHeader {
        class,
        little_endian,
        object_type: r.u16(16)?,
        machine: r.u16(18)?,
        phoff,
        phentsize,
        phnum,
    })
}

/// `p_align` of every `PT_LOAD` segment, in program header order.
///
/// Truncated program header tables yield the segments that could be read.
pub fn load_alignments(bytes: &[u8], header: &ElfHeader) -> Vec<u64> {
    let r = Reader {
        bytes,
        little_endian: header.little_endian,
    };
    let mut aligns = Vec::new();
    for i in 0..usize::from(header.phnum) {
        let Some(base) = usize::try_from(header.phoff)
            .ok()
            .and_then(|off| off.checked_add(i * usize::from(header.phentsize)))
        else {
            break;
        };
        let Some(p_type) = r.u32(base) else {
            break;
        };
        if p_type != PT_LOAD {
            continue;
        }
        let align = match header.class {
            ElfClass::Elf64 => r.u64(base + 48),
            ElfClass::Elf32 => r.u32(base + 28).map(u64::from),
        };
        match align {
            Some(a) => aligns.push(a),
            None => break,
        }
    }
    aligns
}
