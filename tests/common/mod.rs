//! Binary fixture builders: the encode side of every format this crate
//! decodes, used to synthesize layouts, indexes, bundles and CAS archives
//! on disk for the scenario tests.
#![allow(dead_code)]

use std::path::Path;

// ── LEB128 / strings ─────────────────────────────────────────────────────────

pub fn leb(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

pub fn cstr(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.push(0x00);
    out
}

// ── Tagged-record encoding (inverse of the decoder's field table) ────────────

pub fn field_guid(name: &str, value: [u8; 16]) -> Vec<u8> {
    let mut out = vec![0x0f];
    out.extend(cstr(name));
    out.extend_from_slice(&value);
    out
}

pub fn field_u32(name: &str, value: u32) -> Vec<u8> {
    let mut out = vec![0x08];
    out.extend(cstr(name));
    out.extend_from_slice(&value.to_le_bytes());
    out
}

pub fn field_u64(name: &str, value: u64) -> Vec<u8> {
    let mut out = vec![0x09];
    out.extend(cstr(name));
    out.extend_from_slice(&value.to_le_bytes());
    out
}

pub fn field_bool(name: &str, value: bool) -> Vec<u8> {
    let mut out = vec![0x06];
    out.extend(cstr(name));
    out.push(u8::from(value));
    out
}

pub fn field_string(name: &str, value: &str) -> Vec<u8> {
    let mut out = vec![0x07];
    out.extend(cstr(name));
    out.extend(leb(value.len() as u64 + 1));
    out.extend_from_slice(value.as_bytes());
    out.push(0x00);
    out
}

pub fn field_blob(name: &str, value: &[u8]) -> Vec<u8> {
    let mut out = vec![0x13];
    out.extend(cstr(name));
    out.extend(leb(value.len() as u64));
    out.extend_from_slice(value);
    out
}

pub fn field_sha1(name: &str, value: [u8; 20]) -> Vec<u8> {
    let mut out = vec![0x10];
    out.extend(cstr(name));
    out.extend_from_slice(&value);
    out
}

/// A `0x02` field is a named composite; the decoder rewinds and re-reads
/// the tag and name, so they are emitted once.
pub fn field_record(name: &str, fields: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = fields.concat();
    let mut out = vec![0x02];
    out.extend(cstr(name));
    out.extend(leb(body.len() as u64));
    out.extend(body);
    out
}

pub fn field_list(name: &str, items: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = items.concat();
    let mut out = vec![0x01];
    out.extend(cstr(name));
    out.extend(leb(body.len() as u64 + 1));
    out.extend(body);
    out.push(0x00);
    out
}

pub fn composite(fields: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = fields.concat();
    let mut out = vec![0x82];
    out.extend(leb(body.len() as u64));
    out.extend(body);
    out
}

// ── Outer .toc container ─────────────────────────────────────────────────────

pub const TOC_MAGIC: u32 = 0x00D1_CE01;
pub const TOC_PAYLOAD_OFFSET: usize = 0x22C;

pub fn toc_container(payload: &[u8]) -> Vec<u8> {
    let mut out = TOC_MAGIC.to_be_bytes().to_vec();
    out.resize(TOC_PAYLOAD_OFFSET, 0x00);
    out.extend_from_slice(payload);
    out
}

// ── Layout descriptor ────────────────────────────────────────────────────────

pub struct InstallChunk {
    pub id:                 [u8; 16],
    pub name:               String,
    pub install_bundle:     String,
    pub split_superbundles: Vec<String>,
    pub superbundles:       Vec<String>,
}

pub fn layout_toc(chunks: &[InstallChunk]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = chunks
        .iter()
        .map(|chunk| {
            let splits: Vec<Vec<u8>> = chunk
                .split_superbundles
                .iter()
                .map(|name| composite(&[field_string("superbundle", name)]))
                .collect();
            let supers: Vec<Vec<u8>> = chunk
                .superbundles
                .iter()
                .map(|name| composite(&[field_blob("data", name.as_bytes())]))
                .collect();
            composite(&[
                field_guid("id", chunk.id),
                field_string("name", &chunk.name),
                field_string("installBundle", &chunk.install_bundle),
                field_list("splitSuperbundles", &splits),
                field_list("superbundles", &supers),
            ])
        })
        .collect();

    let payload = composite(&[field_record(
        "installManifest",
        &[field_list("installChunks", &entries)],
    )]);
    toc_container(&payload)
}

// ── CAS blocks ───────────────────────────────────────────────────────────────

pub fn stored_block(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(&0x70u16.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn stored_alt_block(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_be_bytes().to_vec();
    out.extend_from_slice(&0x71u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn oodle_block(decoded_size: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = decoded_size.to_be_bytes().to_vec();
    out.extend_from_slice(&0x1170u16.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Framed input length of a block sequence: payload bytes plus one 8-byte
/// header per block.
pub fn framed_len(payloads: &[&[u8]]) -> u64 {
    payloads.iter().map(|p| p.len() as u64 + 8).sum()
}

// ── Superbundle index ────────────────────────────────────────────────────────

pub struct IndexBundle {
    pub name:      String,
    pub sb_offset: u32,
    pub size:      u32,
    pub flags:     u32,
}

pub struct IndexResource {
    pub flags:  u32,
    pub sha1:   [u8; 20],
    pub cas_id: u32,
    pub offset: u32,
    pub size:   u32,
}

/// Encode an index payload (the bytes after the outer container header).
pub fn index_payload(bundles: &[IndexBundle], resources: &[IndexResource]) -> Vec<u8> {
    let item_count = bundles.len() as u32;
    let res_count = resources.len() as u32;

    if bundles.is_empty() {
        let mut out = Vec::new();
        out.extend_from_slice(&0x30u32.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes()); // length
        out.extend_from_slice(&0u32.to_be_bytes()); // item_count
        out.extend_from_slice(&[0u8; 4 * 8]); // offsets + res_count + trailers
        return out;
    }

    // String table contents and per-bundle name offsets.
    let mut strings = Vec::new();
    let name_offsets: Vec<u32> = bundles
        .iter()
        .map(|bundle| {
            let off = strings.len() as u32;
            strings.extend(cstr(&bundle.name));
            off
        })
        .collect();

    let header_len = 44u64;
    let refs_end = header_len + 4 * u64::from(item_count) + 4;
    let descriptors_start = refs_end.div_ceil(8) * 8;
    let offset1 = descriptors_start + 16 * u64::from(item_count);
    let offset2 = offset1 + 4 * u64::from(res_count);
    let offset4 = offset2 + 20 * u64::from(res_count);
    let offset5 = offset4;
    let offset6 = offset5 + 12 * u64::from(res_count);
    let total_len = offset6 + strings.len() as u64;

    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(&0x30u32.to_be_bytes());
    out.extend_from_slice(&(total_len as u32).to_be_bytes());
    out.extend_from_slice(&item_count.to_be_bytes());
    out.extend_from_slice(&(offset1 as u32).to_be_bytes());
    out.extend_from_slice(&(offset2 as u32).to_be_bytes());
    out.extend_from_slice(&res_count.to_be_bytes());
    out.extend_from_slice(&(offset4 as u32).to_be_bytes());
    out.extend_from_slice(&(offset5 as u32).to_be_bytes());
    out.extend_from_slice(&(offset6 as u32).to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // offset7
    out.extend_from_slice(&0u32.to_be_bytes()); // sec4_size

    for bundle in bundles {
        out.extend_from_slice(&bundle.flags.to_be_bytes());
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out.resize(descriptors_start as usize, 0x00);

    for (bundle, name_off) in bundles.iter().zip(&name_offsets) {
        out.extend_from_slice(&name_off.to_be_bytes());
        out.extend_from_slice(&bundle.size.to_be_bytes());
        out.extend_from_slice(&0u32.to_be_bytes()); // unknown
        out.extend_from_slice(&bundle.sb_offset.to_be_bytes());
    }

    for resource in resources {
        out.extend_from_slice(&resource.flags.to_be_bytes());
    }
    for resource in resources {
        out.extend_from_slice(&resource.sha1);
    }
    for resource in resources {
        out.extend_from_slice(&resource.cas_id.to_be_bytes());
        out.extend_from_slice(&resource.offset.to_be_bytes());
        out.extend_from_slice(&resource.size.to_be_bytes());
    }
    out.extend(strings);
    out
}

// ── Bundle records ───────────────────────────────────────────────────────────

pub struct EbxSpec {
    pub name:      String,
    pub sha1:      [u8; 20],
    pub orig_size: u32,
}

pub struct ResourceSpec {
    pub name:            String,
    pub sha1:            [u8; 20],
    pub orig_size:       u32,
    pub content_type_id: u32,
    pub meta:            [u8; 16],
    pub rid:             u64,
}

pub struct ChunkSpec {
    pub uid:            [u8; 16],
    pub sha1:           [u8; 20],
    pub range_start:    u16,
    pub logical_size:   u16,
    pub logical_offset: u32,
    pub h32:            u32,
    pub first_mip:      Option<u32>,
}

/// One payload-section location entry.
pub enum PayloadEntry {
    /// Bare offset under the carried-over CAS identifier.
    Offset { offset: u32, size: u32 },
    /// Explicit identifier switch followed by the offset.
    Switch { cas_id: u32, offset: u32, size: u32 },
}

pub struct BundleSpec {
    pub ebx:            Vec<EbxSpec>,
    pub resources:      Vec<ResourceSpec>,
    pub chunks:         Vec<ChunkSpec>,
    pub initial_cas_id: u32,
    /// One entry per asset: Ebx first, then Resources, then Chunks.
    pub entries:        Vec<PayloadEntry>,
}

impl BundleSpec {
    pub fn empty() -> Self {
        Self {
            ebx:            Vec::new(),
            resources:      Vec::new(),
            chunks:         Vec::new(),
            initial_cas_id: 0,
            entries:        Vec::new(),
        }
    }
}

pub const BUNDLE_HEADER_MAGIC: u32 = 0x9D79_8ED6;

/// Encode one bundle record as it appears inside a `.sb` file.
pub fn bundle_record(spec: &BundleSpec) -> Vec<u8> {
    let total = (spec.ebx.len() + spec.resources.len() + spec.chunks.len()) as u32;

    // String table and name offsets for Ebx ∥ Resources.
    let mut strings = Vec::new();
    let mut name_offset = |name: &str| -> u32 {
        let off = strings.len() as u32;
        strings.extend(cstr(name));
        off
    };
    let ebx_names: Vec<u32> = spec.ebx.iter().map(|e| name_offset(&e.name)).collect();
    let res_names: Vec<u32> = spec.resources.iter().map(|r| name_offset(&r.name)).collect();

    // Everything between the 8-word header and the string table.
    let mut tables = Vec::new();
    for entry in &spec.ebx {
        tables.extend_from_slice(&entry.sha1);
    }
    for entry in &spec.resources {
        tables.extend_from_slice(&entry.sha1);
    }
    for entry in &spec.chunks {
        tables.extend_from_slice(&entry.sha1);
    }
    for (entry, name_off) in spec.ebx.iter().zip(&ebx_names) {
        tables.extend_from_slice(&name_off.to_be_bytes());
        tables.extend_from_slice(&entry.orig_size.to_be_bytes());
    }
    for (entry, name_off) in spec.resources.iter().zip(&res_names) {
        tables.extend_from_slice(&name_off.to_be_bytes());
        tables.extend_from_slice(&entry.orig_size.to_be_bytes());
    }
    for entry in &spec.resources {
        tables.extend_from_slice(&entry.content_type_id.to_be_bytes());
    }
    for entry in &spec.resources {
        tables.extend_from_slice(&entry.meta);
    }
    for entry in &spec.resources {
        tables.extend_from_slice(&entry.rid.to_be_bytes());
    }
    for entry in &spec.chunks {
        tables.extend_from_slice(&entry.uid);
        tables.extend_from_slice(&entry.range_start.to_be_bytes());
        tables.extend_from_slice(&entry.logical_size.to_be_bytes());
        tables.extend_from_slice(&entry.logical_offset.to_be_bytes());
    }

    let chunk_meta_offset = 32 + tables.len() as u32;
    let mut chunk_meta = Vec::new();
    if !spec.chunks.is_empty() {
        let items: Vec<Vec<u8>> = spec
            .chunks
            .iter()
            .map(|chunk| {
                let meta_fields: Vec<Vec<u8>> = chunk
                    .first_mip
                    .map(|mip| vec![field_u32("firstMip", mip)])
                    .unwrap_or_default();
                composite(&[
                    field_u32("h32", chunk.h32),
                    field_record("meta", &meta_fields),
                ])
            })
            .collect();
        chunk_meta = field_list("chunkMeta", &items);
    }

    let string_offset = chunk_meta_offset + chunk_meta.len() as u32;

    let mut meta = Vec::new();
    meta.extend_from_slice(&BUNDLE_HEADER_MAGIC.to_be_bytes());
    meta.extend_from_slice(&total.to_be_bytes());
    meta.extend_from_slice(&(spec.ebx.len() as u32).to_be_bytes());
    meta.extend_from_slice(&(spec.resources.len() as u32).to_be_bytes());
    meta.extend_from_slice(&(spec.chunks.len() as u32).to_be_bytes());
    meta.extend_from_slice(&string_offset.to_be_bytes());
    meta.extend_from_slice(&chunk_meta_offset.to_be_bytes());
    meta.extend_from_slice(&(chunk_meta.len() as u32).to_be_bytes());
    meta.extend(tables);
    meta.extend(chunk_meta);
    meta.extend(strings);

    let mut payload = Vec::new();
    if total > 0 {
        payload.extend_from_slice(&spec.initial_cas_id.to_be_bytes());
        for entry in &spec.entries {
            match entry {
                PayloadEntry::Offset { offset, size } => {
                    payload.extend_from_slice(&offset.to_be_bytes());
                    payload.extend_from_slice(&size.to_be_bytes());
                }
                PayloadEntry::Switch { cas_id, offset, size } => {
                    payload.extend_from_slice(&cas_id.to_be_bytes());
                    payload.extend_from_slice(&offset.to_be_bytes());
                    payload.extend_from_slice(&size.to_be_bytes());
                }
            }
        }
    }

    let bundle_len = (32 + 4 + meta.len() + payload.len()) as u32;
    let mut out = Vec::with_capacity(bundle_len as usize);
    out.extend_from_slice(&0x20u32.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // unknown
    out.extend_from_slice(&bundle_len.to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // count
    out.extend_from_slice(&[0u8; 12]); // three offsets
    out.extend_from_slice(&0u32.to_be_bytes()); // padding
    out.extend_from_slice(&(meta.len() as u32).to_be_bytes());
    out.extend(meta);
    out.extend(payload);
    out
}

// ── Filesystem helpers ───────────────────────────────────────────────────────

pub fn write_file(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}
