use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use esmcache_core::{
    CacheConfig, CacheContext, CachingCompiler, CompileRequest, ModuleKind, SourceType,
};
use esmcache_test_helpers::{entry_for, persistent_package, ToyCompiler};
use std::path::Path;
use tempfile::TempDir;

fn generate_module(index: usize, export_count: usize) -> String {
    let mut code = format!("import {{ shared }} from './shared_{}.js'\n", index % 7);
    for i in 0..export_count {
        code.push_str(&format!("export const value_{index}_{i} = shared + {i}\n"));
    }
    code.push_str(&format!("export default value_{index}_0\n"));
    code
}

fn request() -> CompileRequest {
    CompileRequest {
        source_type: SourceType::Module,
        ..CompileRequest::default()
    }
}

/// One process lifetime over `root`: compile or reuse every module, then flush
fn run(config: &CacheConfig, root: &Path, modules: &[String]) -> usize {
    let ctx = CacheContext::new(config.clone());
    let Ok(package) = persistent_package(&ctx, root) else {
        return 0;
    };
    let mut compiler = CachingCompiler::new(&ctx, ToyCompiler::new());

    for (i, source) in modules.iter().enumerate() {
        let filename = root.join(format!("module_{i}.mjs"));
        let entry = entry_for(&ctx, &package, &filename, source, &request(), ModuleKind::Esm);
        if compiler.from_cache(&entry).is_none() {
            compiler
                .compile(&entry, source, &request())
                .expect("generated modules compile");
        }
        compiler.stage_script_data(&entry, vec![(i % 256) as u8; 64]);
    }

    let calls = compiler.compiler().calls;
    ctx.shutdown();
    calls
}

fn bench_cold_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("cold_flush");

    for module_count in [10, 50, 200] {
        let modules: Vec<String> = (0..module_count).map(|i| generate_module(i, 5)).collect();
        let config = CacheConfig::default();

        group.bench_with_input(
            BenchmarkId::from_parameter(module_count),
            &modules,
            |b, modules| {
                b.iter(|| {
                    let temp_dir = TempDir::new().expect("Failed to create temp dir");
                    black_box(run(&config, temp_dir.path(), modules))
                })
            },
        );
    }

    group.finish();
}

fn bench_warm_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_reuse");

    for module_count in [10, 50, 200] {
        let modules: Vec<String> = (0..module_count).map(|i| generate_module(i, 5)).collect();
        let config = CacheConfig::default();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        run(&config, temp_dir.path(), &modules);

        group.bench_with_input(
            BenchmarkId::from_parameter(module_count),
            &modules,
            |b, modules| b.iter(|| black_box(run(&config, temp_dir.path(), modules))),
        );
    }

    group.finish();
}

fn bench_gzip_flush(c: &mut Criterion) {
    let modules: Vec<String> = (0..50).map(|i| generate_module(i, 20)).collect();
    let config = CacheConfig {
        gzip: true,
        ..CacheConfig::default()
    };

    c.bench_function("gzip_flush_50", |b| {
        b.iter(|| {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            black_box(run(&config, temp_dir.path(), &modules))
        })
    });
}

criterion_group!(benches, bench_cold_flush, bench_warm_reuse, bench_gzip_flush);
criterion_main!(benches);
