use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tap_client::adql::set_top_in_query;
use tap_client::xmlparser::{parse_job_list, parse_jobs, parse_tables, parse_votable_summary};

const TABLES: &str = include_str!("../tests/data/test_tables.xml");
const JOB: &str = include_str!("../tests/data/test_job.xml");
const JOB_LIST: &str = include_str!("../tests/data/test_jobs_list.xml");

/// Tableset with `n` tables of 20 columns each.
fn large_tableset(n: usize) -> String {
    let mut xml = String::from("<tableset><schema><name>gaia</name>");
    for t in 0..n {
        xml.push_str(&format!(
            "<table esatapplus:size_bytes=\"{}\"><name>gaia.table_{}</name>",
            t * 1024,
            t
        ));
        for c in 0..20 {
            xml.push_str(&format!(
                "<column esatapplus:flags=\"{}\"><name>col_{}</name><ucd>meta.id</ucd>\
                 <dataType arraysize=\"*\">char</dataType><flag>indexed</flag></column>",
                c % 3,
                c
            ));
        }
        xml.push_str("</table>");
    }
    xml.push_str("</schema></tableset>");
    xml
}

/// VOTable with `rows` rows of three cells.
fn large_votable(rows: usize) -> String {
    let mut xml = String::from(
        "<VOTABLE><RESOURCE><INFO name=\"QUERY_STATUS\" value=\"OK\"/><TABLE>\
         <FIELD name=\"ra\" datatype=\"double\"/><FIELD name=\"dec\" datatype=\"double\"/>\
         <FIELD name=\"id\" datatype=\"long\"/><DATA><TABLEDATA>",
    );
    for i in 0..rows {
        xml.push_str(&format!(
            "<TR><TD>{}</TD><TD>{}</TD><TD>{}</TD></TR>",
            i as f64 * 0.01,
            -(i as f64) * 0.01,
            i
        ));
    }
    xml.push_str("</TABLEDATA></DATA></TABLE></RESOURCE></VOTABLE>");
    xml
}

fn bench_metadata_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata_parsing");

    group.bench_function("tables_fixture", |b| {
        b.iter(|| parse_tables(black_box(TABLES.as_bytes())))
    });
    group.bench_function("job_fixture", |b| {
        b.iter(|| parse_jobs(black_box(JOB.as_bytes())))
    });
    group.bench_function("job_list_fixture", |b| {
        b.iter(|| parse_job_list(black_box(JOB_LIST.as_bytes())))
    });

    for n in [10, 100] {
        let xml = large_tableset(n);
        group.bench_with_input(BenchmarkId::new("large_tableset", n), &xml, |b, input| {
            b.iter(|| parse_tables(black_box(input.as_bytes())))
        });
    }

    group.finish();
}

fn bench_votable_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("votable_summary");

    for rows in [100, 10_000] {
        let xml = large_votable(rows);
        group.bench_with_input(BenchmarkId::new("rows", rows), &xml, |b, input| {
            b.iter(|| parse_votable_summary(black_box(input.as_bytes())))
        });
    }

    group.finish();
}

fn bench_set_top(c: &mut Criterion) {
    let query = "SELECT DISTINCT source_id, ra, dec FROM gaiadr3.gaia_source \
                 WHERE phot_g_mean_mag < 'TOP' AND ra BETWEEN 10 AND 20";
    c.bench_function("set_top_in_query", |b| {
        b.iter(|| set_top_in_query(black_box(query), black_box(2000)))
    });
}

criterion_group!(
    benches,
    bench_metadata_parsing,
    bench_votable_summary,
    bench_set_top
);
criterion_main!(benches);
