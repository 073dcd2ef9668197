//! Bundle fixtures built in memory.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use std::io::Write;

const STORED: u16 = 0;
const DEFLATE: u16 = 8;

fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn gzip(text: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text).unwrap();
    encoder.finish().unwrap()
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Writes a zip file member by member
#[derive(Default)]
pub struct ZipBuilder {
    data: Vec<u8>,
    central: Vec<u8>,
    count: u16,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every size and offset saturated and moved to ZIP64 records
    pub fn zip64() -> Self {
        Self {
            zip64: true,
            ..Self::default()
        }
    }

    pub fn stored(self, name: &str, content: &[u8]) -> Self {
        self.member(name, STORED, content.to_vec(), crc32(content), content.len())
    }

    pub fn deflated(self, name: &str, content: &[u8]) -> Self {
        self.member(name, DEFLATE, deflate(content), crc32(content), content.len())
    }

    pub fn directory(self, name: &str) -> Self {
        self.member(name, STORED, Vec::new(), 0, 0)
    }

    /// A member whose recorded CRC-32 does not match its content
    pub fn with_bad_crc(self, name: &str, content: &[u8]) -> Self {
        self.member(name, STORED, content.to_vec(), crc32(content) ^ 0xDEAD_BEEF, content.len())
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.as_bytes().to_vec();
        self
    }

    fn member(
        mut self,
        name: &str,
        method: u16,
        stored: Vec<u8>,
        crc: u32,
        uncompressed: usize,
    ) -> Self {
        let offset = self.data.len() as u64;
        let name = name.as_bytes();
        let zip64 = self.zip64;
        let narrow = |value: u64| if zip64 { 0xFFFF_FFFF } else { value as u32 };

        let lfh = &mut self.data;
        lfh.write_all(b"PK\x03\x04").unwrap();
        lfh.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap();
        lfh.write_u16::<LittleEndian>(0).unwrap();
        lfh.write_u16::<LittleEndian>(method).unwrap();
        lfh.write_u16::<LittleEndian>(0).unwrap();
        lfh.write_u16::<LittleEndian>(0x5821).unwrap();
        lfh.write_u32::<LittleEndian>(crc).unwrap();
        lfh.write_u32::<LittleEndian>(narrow(stored.len() as u64)).unwrap();
        lfh.write_u32::<LittleEndian>(narrow(uncompressed as u64)).unwrap();
        lfh.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        lfh.write_u16::<LittleEndian>(if zip64 { 20 } else { 0 }).unwrap();
        lfh.write_all(name).unwrap();
        if zip64 {
            lfh.write_u16::<LittleEndian>(0x0001).unwrap();
            lfh.write_u16::<LittleEndian>(16).unwrap();
            lfh.write_u64::<LittleEndian>(uncompressed as u64).unwrap();
            lfh.write_u64::<LittleEndian>(stored.len() as u64).unwrap();
        }
        lfh.write_all(&stored).unwrap();

        let cd = &mut self.central;
        cd.write_all(b"PK\x01\x02").unwrap();
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(if zip64 { 45 } else { 20 }).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(method).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0x5821).unwrap();
        cd.write_u32::<LittleEndian>(crc).unwrap();
        cd.write_u32::<LittleEndian>(narrow(stored.len() as u64)).unwrap();
        cd.write_u32::<LittleEndian>(narrow(uncompressed as u64)).unwrap();
        cd.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        cd.write_u16::<LittleEndian>(if zip64 { 28 } else { 0 }).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(narrow(offset)).unwrap();
        cd.write_all(name).unwrap();
        if zip64 {
            cd.write_u16::<LittleEndian>(0x0001).unwrap();
            cd.write_u16::<LittleEndian>(24).unwrap();
            cd.write_u64::<LittleEndian>(uncompressed as u64).unwrap();
            cd.write_u64::<LittleEndian>(stored.len() as u64).unwrap();
            cd.write_u64::<LittleEndian>(offset).unwrap();
        }

        self.count += 1;
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = self.data;
        let cd_offset = out.len() as u64;
        let cd_size = self.central.len() as u64;
        out.extend_from_slice(&self.central);

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.write_all(b"PK\x06\x06").unwrap();
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(self.count as u64).unwrap();
            out.write_u64::<LittleEndian>(cd_size).unwrap();
            out.write_u64::<LittleEndian>(cd_offset).unwrap();

            out.write_all(b"PK\x06\x07").unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(eocd64_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (count, cd_size, cd_offset) = if self.zip64 {
            (0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (self.count, cd_size as u32, cd_offset as u32)
        };
        out.write_all(b"PK\x05\x06").unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u16::<LittleEndian>(count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.write_all(&self.comment).unwrap();
        out
    }
}
