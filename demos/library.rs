/// # library_es demo: an event-sourced library catalog
///
/// Wires the whole runtime together in-process: a `Library` aggregate served
/// by the command dispatcher, a book read model maintained by the projection
/// engine, and the two query shapes a request layer would expose.
///
/// ## Usage
///
/// ```sh
/// RUST_LOG=debug cargo run --example library
/// ```
use library_es::library::{
    BookProjector, GetBooksQuery, GetLibraryQuery, Library, LibraryCommand, LibraryQueries,
    MemoryBookStore,
};
use library_es::{
    AggregateRepository, CommandDispatcher, MemoryEventStore, ProjectionEngine, QueriesRunner,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = MemoryEventStore::new();
    let books = MemoryBookStore::new();
    let (mut engine, sender) =
        ProjectionEngine::new(vec![Box::new(BookProjector::new(books.clone()))]);
    let dispatcher: CommandDispatcher<Library, _> =
        CommandDispatcher::new(AggregateRepository::new(store.clone()), sender);
    let queries = LibraryQueries::default();

    dispatcher
        .dispatch(LibraryCommand::RegisterLibrary {
            library_id: Some(1),
            name: Some("Central".to_string()),
        })
        .await?;

    dispatcher
        .dispatch(LibraryCommand::RegisterBook {
            library_id: Some(1),
            isbn: Some("978-1".to_string()),
            title: Some("Dune".to_string()),
        })
        .await?;

    // A long-running service would `tokio::spawn(engine.run())`; here we
    // drain once so the queries below observe the committed events.
    engine.drain().await;

    let library = queries
        .run(&GetLibraryQuery::new(1, AggregateRepository::new(store.clone())))
        .await?
        .expect("library 1 was just registered");
    println!(
        "library {}: {} with books {:?}",
        1,
        library.name(),
        library.isbn_books()
    );
    assert_eq!(library.isbn_books(), ["978-1"]);

    let rows = queries.run(&GetBooksQuery::new(1, books.clone())).await?;
    for row in &rows {
        println!("book {} ({:?}) in library {}", row.isbn, row.title, row.library_id);
    }
    assert_eq!(rows.len(), 1);

    // A command against a library that was never created is rejected.
    let err = dispatcher
        .dispatch(LibraryCommand::RegisterBook {
            library_id: Some(99),
            isbn: Some("X".to_string()),
            title: Some("Y".to_string()),
        })
        .await
        .unwrap_err();
    println!("rejected as expected: {err}");

    Ok(())
}
