use resilient_fetch::{FetchClient, StudentQuery, StudentStatus, StudentsApi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = FetchClient::from_env()?;
    let api = StudentsApi::new(client);

    let page = api
        .list(&StudentQuery {
            status: Some(StudentStatus::Pending),
            ..StudentQuery::default()
        })
        .await?;

    println!(
        "page {} of {} ({} students total)",
        page.page, page.total_pages, page.total
    );
    for student in page.data {
        println!("{} <{}> {} [{}]", student.name, student.email, student.program, student.status);
    }

    Ok(())
}
