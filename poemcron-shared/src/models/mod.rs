/// Data models for poemcron
///
/// # Models
///
/// - `poem`: The sentence endpoint payload and the normalized `t_poem` row
///
/// # Example
///
/// ```
/// use poemcron_shared::models::poem::{NormalizedPoem, RawPoemResponse};
///
/// # fn example(raw: RawPoemResponse) {
/// let poem = NormalizedPoem::from(&raw);
/// println!("{} ({}) by {}", poem.title, poem.dynasty, poem.author);
/// # }
/// ```

pub mod poem;

pub use poem::{NormalizedPoem, RawPoemResponse, Translation};
