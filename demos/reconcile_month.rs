use fuel_bill_reconciler::*;

fn labor_records() -> Dataset {
    Dataset::from_rows(
        ["Employee", "Date", "JobNumber", "Hours"],
        vec![
            vec!["John Doe".into(), "2024-09-03".into(), "24-117".into(), CellValue::Number(8.0)],
            vec!["John Doe".into(), "2024-09-04".into(), "24-117".into(), CellValue::Number(6.5)],
            vec!["Jane Smith".into(), "2024-09-03".into(), "24-120".into(), CellValue::Number(8.0)],
            vec!["Jane Smith".into(), "2024-09-05".into(), "24-121".into(), CellValue::Number(4.0)],
            vec!["Ray Ortiz".into(), "2024-08-30".into(), "24-099".into(), CellValue::Number(8.0)],
        ],
    )
    .unwrap()
}

fn fuel_records() -> Dataset {
    Dataset::from_rows(
        ["Date", "Employee", "JobNumber", "Gallons", "Amount"],
        vec![
            vec!["09/03/2024".into(), "John Doe".into(), "24-117".into(), CellValue::Number(18.2), CellValue::Number(64.61)],
            vec!["09/04/2024".into(), "John Doe".into(), "24-171".into(), CellValue::Number(11.0), CellValue::Number(39.05)],
            vec!["09/03/2024".into(), "Jane Smith".into(), "24-120".into(), CellValue::Number(22.4), CellValue::Number(79.52)],
            vec!["09/06/2024".into(), "Jane Smith".into(), "24-121".into(), CellValue::Number(9.1), CellValue::Number(32.31)],
        ],
    )
    .unwrap()
}

fn print_dataset(title: &str, dataset: &Dataset) {
    println!("{} ({} rows)", title, dataset.len());
    println!("  {}", dataset.columns().join(" | "));
    for row in dataset.rows() {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        println!("  {}", cells.join(" | "));
    }
    println!();
}

fn main() {
    let summary = RawTable::from(vec![
        vec!["DESCRIPTION", "DEPARTMENT", "GALLONS", "AMOUNT"],
        vec![
            "TOTAL",
            "FLEET\nACCOUNTS RECEIVABLE\nSHOP",
            "412.6\n0\n88.1",
            "1464.73\n0.00\n312.76",
        ],
        vec!["YTD", "FLEET\nSHOP", "3920.4\n801.0", "13917.42\n2843.55"],
    ]);

    println!("📄 Splitting financial summary by department...\n");
    let departments = process_table(&summary, &DepartmentSplitConfig::default()).unwrap();
    print_dataset("Departments", &departments);

    println!("🔎 Reconciling labor against fuel charges for September 2024...\n");
    let config = ReconciliationConfig::for_period("2024-09".parse().unwrap());
    let report = Reconciler::process(&config, &labor_records(), &fuel_records()).unwrap();

    print_dataset("✅ Matching job numbers", &report.good);
    print_dataset("❌ Mismatched job numbers", &report.bad);

    println!(
        "Joined {} row(s); {} labor and {} fuel row(s) had no counterpart",
        report.joined_rows, report.unmatched_left, report.unmatched_right
    );

    println!("\n📐 Reconciliation config schema:");
    println!("{}", ReconciliationConfig::schema_as_json().unwrap());
}
