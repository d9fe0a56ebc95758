use brickops::xml::parse_cli_output;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `volume info --xml` answer for a replica 3 volume with `bricks` bricks
fn volume_info_xml(bricks: usize) -> String {
    let mut brick_xml = String::new();
    for i in 0..bricks {
        brick_xml.push_str(&format!(
            "<brick uuid=\"u{i}\"><name>node{}:/bricks/b{i}/brick</name><hostUuid>u{i}</hostUuid><isArbiter>0</isArbiter></brick>",
            i % 3
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cliOutput>
  <opRet>0</opRet>
  <opErrno>0</opErrno>
  <opErrstr/>
  <volInfo>
    <volumes>
      <volume>
        <name>vol_bench</name>
        <id>7e3c2a10-5b1d-4c2e-9f00-1a2b3c4d5e6f</id>
        <status>1</status>
        <statusStr>Started</statusStr>
        <brickCount>{bricks}</brickCount>
        <distCount>{}</distCount>
        <stripeCount>1</stripeCount>
        <replicaCount>3</replicaCount>
        <arbiterCount>0</arbiterCount>
        <disperseCount>0</disperseCount>
        <redundancyCount>0</redundancyCount>
        <type>2</type>
        <typeStr>Distributed-Replicate</typeStr>
        <transport>0</transport>
        <bricks>{brick_xml}</bricks>
        <optCount>2</optCount>
        <options>
          <option><name>performance.readdir-ahead</name><value>on</value></option>
          <option><name>server.tcp-user-timeout</name><value>42</value></option>
        </options>
      </volume>
      <count>1</count>
    </volumes>
  </volInfo>
</cliOutput>"#,
        bricks / 3
    )
}

fn heal_info_xml(bricks: usize) -> String {
    let mut brick_xml = String::new();
    for i in 0..bricks {
        brick_xml.push_str(&format!(
            "<brick hostUuid=\"u{i}\"><name>node{}:/bricks/b{i}/brick</name><status>Connected</status><numberOfEntries>{i}</numberOfEntries></brick>",
            i % 3
        ));
    }

    format!(
        "<cliOutput><opRet>0</opRet><opErrno>0</opErrno><opErrstr/><healInfo><bricks>{}</bricks></healInfo></cliOutput>",
        brick_xml
    )
}

/// Benchmark volume info parsing across volume sizes
fn bench_volume_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("volume_info");

    for bricks in [3, 30, 300].iter() {
        let xml = volume_info_xml(*bricks);
        group.bench_with_input(BenchmarkId::from_parameter(bricks), &xml, |b, xml| {
            b.iter(|| {
                let volume = parse_cli_output(black_box(xml))
                    .unwrap()
                    .into_volume()
                    .unwrap();
                assert_eq!(volume.brick_count as usize, *bricks);
            });
        });
    }

    group.finish();
}

/// Benchmark heal info parsing and entry totals
fn bench_heal_info(c: &mut Criterion) {
    let mut group = c.benchmark_group("heal_info");

    for bricks in [3, 30, 300].iter() {
        let xml = heal_info_xml(*bricks);
        group.bench_with_input(BenchmarkId::from_parameter(bricks), &xml, |b, xml| {
            b.iter(|| {
                let heal = parse_cli_output(black_box(xml))
                    .unwrap()
                    .into_heal_info()
                    .unwrap();
                black_box(heal.pending_entries());
            });
        });
    }

    group.finish();
}

/// Benchmark the failure path: envelope with a non-zero opRet
fn bench_error_envelope(c: &mut Criterion) {
    let xml = "<cliOutput><opRet>-1</opRet><opErrno>30800</opErrno><opErrstr>Volume vol_bench does not exist</opErrstr></cliOutput>";

    c.bench_function("error_envelope", |b| {
        b.iter(|| {
            assert!(parse_cli_output(black_box(xml)).is_err());
        });
    });
}

criterion_group!(
    benches,
    bench_volume_info,
    bench_heal_info,
    bench_error_envelope
);
criterion_main!(benches);
