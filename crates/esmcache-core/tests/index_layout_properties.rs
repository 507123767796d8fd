use esmcache_core::compress::Gzip;
use esmcache_core::fs::MockFileSystem;
use esmcache_core::{
    CacheConfig, CacheContext, CacheIndex, CachingCompiler, CompileRequest, Entry, ModuleKind,
    PackageCache, PackageOptions,
};
use esmcache_test_helpers::ToyCompiler;
use proptest::prelude::*;
use std::path::Path;
use std::rc::Rc;

/// Flush one package whose modules carry the given script data and return
/// the written blob and index
fn flush_with(script_data: &[Option<Vec<u8>>]) -> (Vec<u8>, CacheIndex, Vec<String>) {
    let fs = Rc::new(MockFileSystem::new());
    let ctx = CacheContext::with_io(CacheConfig::default(), fs.clone(), Rc::new(Gzip::default()));
    let package = PackageCache::new("/c", PackageOptions::default()).into_ref();
    let mut compiler = CachingCompiler::new(&ctx, ToyCompiler::new());

    let mut keys = Vec::new();
    for (i, data) in script_data.iter().enumerate() {
        let key = format!("{i:08x}00000000.js");
        let entry = Entry::new(key.clone(), ctx.runtime_tag(), ModuleKind::Esm, package.clone());
        compiler
            .compile(&entry, &format!("export const v{i} = {i}"), &CompileRequest::default())
            .unwrap();
        if let Some(bytes) = data {
            assert!(compiler.stage_script_data(&entry, bytes.clone()));
        }
        keys.push(key);
    }

    ctx.shutdown();

    let blob = fs.file(Path::new("/c/data.blob")).unwrap();
    let index = CacheIndex::from_json_slice(&fs.file(Path::new("/c/data.json")).unwrap()).unwrap();
    (blob, index, keys)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_ranges_are_ordered_disjoint_and_in_bounds(
        script_data in prop::collection::vec(prop::option::of(prop::collection::vec(any::<u8>(), 0..32)), 1..12)
    ) {
        let (blob, index, keys) = flush_with(&script_data);

        prop_assert!(index.check_ranges(blob.len()).is_empty());
        prop_assert_eq!(index.keys().collect::<Vec<_>>(), keys.iter().map(String::as_str).collect::<Vec<_>>());

        let expected_len: usize = script_data.iter().flatten().map(Vec::len).sum();
        prop_assert_eq!(blob.len(), expected_len);

        for (key, data) in keys.iter().zip(&script_data) {
            let record = index.get(key).unwrap();
            match data {
                Some(bytes) => prop_assert_eq!(record.range.slice(&blob), Some(bytes.as_slice())),
                None => prop_assert!(record.range.is_none()),
            }
            prop_assert!(record.meta.is_some());
        }
    }
}

#[test]
fn test_empty_script_data_gets_empty_range() {
    let (blob, index, keys) = flush_with(&[Some(vec![1, 2]), Some(Vec::new()), Some(vec![3])]);

    assert_eq!(blob, vec![1, 2, 3]);
    let ranges: Vec<_> = keys
        .iter()
        .map(|key| {
            let range = index.get(key).unwrap().range;
            (range.start, range.end)
        })
        .collect();
    assert_eq!(ranges, vec![(0, 2), (2, 2), (2, 3)]);
}
