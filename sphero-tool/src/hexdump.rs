const WIDTH: usize = 0x10;

/// One line of a hexdump: offset, hex bytes, and printable characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line<'a> {
    offset: usize,
    data: &'a [u8],
}

pub fn printable(chr: u8) -> Option<char> {
    if (0x20..0x7f).contains(&chr) {
        Some(chr as char)
    } else {
        None
    }
}

impl<'a> std::fmt::Display for Line<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:04x}", self.offset)?;

        for i in 0..WIDTH {
            if i % 8 == 0 {
                write!(f, " ")?;
            }
            match self.data.get(i) {
                Some(b) => write!(f, " {:02x}", b)?,
                None => write!(f, "   ")?,
            }
        }

        write!(f, "  |")?;
        for b in self.data {
            write!(f, "{}", printable(*b).unwrap_or('.'))?;
        }
        write!(f, "|")
    }
}

pub fn lines(data: &[u8]) -> impl Iterator<Item = Line> {
    data.chunks(WIDTH).enumerate().map(|(i, data)| Line {
        offset: i * WIDTH,
        data,
    })
}

pub fn hexdump(data: &[u8]) {
    hexdump_prefix("", data)
}

pub fn hexdump_prefix(prefix: &str, data: &[u8]) {
    for line in lines(data) {
        println!("{}{}", prefix, line);
    }
}

/// Bytes as one line of space-separated hex.
pub fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
