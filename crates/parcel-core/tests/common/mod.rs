//! Fixture writer for GeoTIFFs laid out the way GDAL writes a band stack: one
//! image, SamplesPerPixel = band count, MinIsBlack, 32-bit float samples,
//! uncompressed strips.
#![allow(dead_code)]

const SHORT: u16 = 3;
const LONG: u16 = 4;
const ASCII: u16 = 2;
const DOUBLE: u16 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// PlanarConfiguration 1: samples of a pixel are adjacent.
    Interleaved,
    /// PlanarConfiguration 2: every band has its own run of strips.
    Planar,
}

/// North-up georeferencing: pixel size and upper-left corner.
#[derive(Debug, Clone, Copy)]
pub struct Georef {
    pub pixel: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

pub struct Stack<'a> {
    pub width: u32,
    pub height: u32,
    /// Row-major values of each band.
    pub bands: &'a [Vec<f32>],
    pub layout: Layout,
    pub rows_per_strip: u32,
    pub georef: Georef,
    pub nodata: Option<&'a str>,
}

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    bytes: Vec<u8>,
}

fn shorts(tag: u16, values: &[u16]) -> Entry {
    Entry {
        tag,
        kind: SHORT,
        count: values.len() as u32,
        bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn longs(tag: u16, values: &[u32]) -> Entry {
    Entry {
        tag,
        kind: LONG,
        count: values.len() as u32,
        bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn doubles(tag: u16, values: &[f64]) -> Entry {
    Entry {
        tag,
        kind: DOUBLE,
        count: values.len() as u32,
        bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn ascii(tag: u16, text: &str) -> Entry {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    Entry {
        tag,
        kind: ASCII,
        count: bytes.len() as u32,
        bytes,
    }
}

fn pad_even(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.push(0);
    }
}

impl Stack<'_> {
    /// Little-endian classic TIFF bytes.
    pub fn encode(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let n = self.bands.len();
        assert!(n > 0 && self.bands.iter().all(|b| b.len() == w * h));
        let rps = self.rows_per_strip as usize;
        let strips_per_plane = h.div_ceil(rps);

        let mut buf = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        let mut write_strip = |buf: &mut Vec<u8>, values: Vec<f32>| {
            offsets.push(buf.len() as u32);
            counts.push((values.len() * 4) as u32);
            buf.extend(values.iter().flat_map(|v| v.to_le_bytes()));
        };

        match self.layout {
            Layout::Interleaved => {
                for s in 0..strips_per_plane {
                    let rows = s * rps..((s + 1) * rps).min(h);
                    let values = rows
                        .flat_map(|r| (0..w).map(move |c| r * w + c))
                        .flat_map(|px| self.bands.iter().map(move |b| b[px]))
                        .collect();
                    write_strip(&mut buf, values);
                }
            }
            Layout::Planar => {
                for band in self.bands {
                    for s in 0..strips_per_plane {
                        let start = s * rps * w;
                        let end = ((s + 1) * rps).min(h) * w;
                        write_strip(&mut buf, band[start..end].to_vec());
                    }
                }
            }
        }

        let planar = match self.layout {
            Layout::Interleaved => 1,
            Layout::Planar => 2,
        };
        let g = self.georef;
        let mut entries = vec![
            longs(256, &[self.width]),
            longs(257, &[self.height]),
            shorts(258, &vec![32; n]),
            shorts(259, &[1]),
            shorts(262, &[1]),
            longs(273, &offsets),
            shorts(277, &[n as u16]),
            longs(278, &[self.rows_per_strip]),
            longs(279, &counts),
            shorts(284, &[planar]),
        ];
        if n > 1 {
            entries.push(shorts(338, &vec![0; n - 1]));
        }
        entries.push(shorts(339, &vec![3; n]));
        entries.push(doubles(33550, &[g.pixel, g.pixel, 0.0]));
        entries.push(doubles(33922, &[0.0, 0.0, 0.0, g.origin_x, g.origin_y, 0.0]));
        if let Some(nd) = self.nodata {
            entries.push(ascii(42113, nd));
        }

        // Values wider than the 4-byte entry slot live before the IFD.
        let mut slots = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.bytes.len() <= 4 {
                let mut inline = entry.bytes.clone();
                inline.resize(4, 0);
                slots.push(inline);
            } else {
                pad_even(&mut buf);
                slots.push((buf.len() as u32).to_le_bytes().to_vec());
                buf.extend_from_slice(&entry.bytes);
            }
        }

        pad_even(&mut buf);
        let ifd = buf.len() as u32;
        buf[4..8].copy_from_slice(&ifd.to_le_bytes());
        buf.extend((entries.len() as u16).to_le_bytes());
        for (entry, slot) in entries.iter().zip(slots) {
            buf.extend(entry.tag.to_le_bytes());
            buf.extend(entry.kind.to_le_bytes());
            buf.extend(entry.count.to_le_bytes());
            buf.extend(slot);
        }
        buf.extend(0u32.to_le_bytes());
        buf
    }
}
