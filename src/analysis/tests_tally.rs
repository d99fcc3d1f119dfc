use tracing::debug;

use super::classify::{self, EditSign};
use crate::pr::types::ChangedFile;
use crate::report::types::TestChangeTally;

/// Count test declarations added and removed in a run of patch lines.
/// Commented-out declarations are ignored.
pub fn count_test_lines<'a, I>(lines: I) -> TestChangeTally
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally = TestChangeTally::default();
    for line in lines {
        if classify::is_commented_out(line) || !classify::contains_test_marker(line) {
            continue;
        }
        match classify::edit_sign(line) {
            EditSign::Added => tally.added += 1,
            EditSign::Removed => tally.deleted += 1,
            EditSign::Neutral => {}
        }
    }
    tally
}

/// Sum test declaration changes over source files.
pub fn count_test_changes<'a, I>(files: I) -> TestChangeTally
where
    I: IntoIterator<Item = &'a ChangedFile>,
{
    let mut total = TestChangeTally::default();
    for file in files {
        let tally = count_test_lines(file.lines());
        debug!(file = %file.filename, added = tally.added, deleted = tally.deleted, "counted test changes");
        total += tally;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_added_and_deleted_tests() {
        let added = [
            "+ [TestMethod] public void AddedTest() { }",
            "+ [TestMethod]",
            "+\t[TestMethod]",
        ];
        let deleted = ["- [TestMethod] public void DeletedTest() { }", "- [TestMethod]"];
        let other = [
            "+ // [TestMethod] public void CommentedOutAddedTest() { }",
            "- // [TestMethod] public void CommentedOutDeletedTest() { }",
            "+ public void NonTestMethod() { }",
            "- public void AnotherNonTestMethod() { }",
        ];

        let lines = added.iter().chain(deleted.iter()).chain(other.iter()).copied();
        let tally = count_test_lines(lines);

        assert_eq!(tally.added, added.len());
        assert_eq!(tally.deleted, deleted.len());
    }

    #[test]
    fn test_context_lines_are_not_counted() {
        let tally = count_test_lines(["    [Fact]", "@@ -1,3 +1,4 @@", "[InlineData(1, 2)]"]);
        assert_eq!(tally, TestChangeTally::default());
    }

    #[test]
    fn test_parameterized_markers() {
        let tally = count_test_lines([
            "+    [DataRow(1, 2)]",
            "+    [InlineData(\"a\")]",
            "-    [TestCase(3)]",
            "-    [Test]",
        ]);
        assert_eq!(tally, TestChangeTally { added: 2, deleted: 2 });
    }

    #[test]
    fn test_sums_across_files() {
        let files = vec![
            ChangedFile::new(
                "Tests/A.cs",
                "@@ -1,4 +1,6 @@\n using Xunit;\n+    [Fact]\n+    public void NewTest() { }\n",
            ),
            ChangedFile::new("Tests/B.cs", "@@ -3,3 +3,1 @@\n-    [Fact]\n-    [InlineData(1)]\n"),
            ChangedFile::new("Tests/Empty.cs", ""),
        ];
        let tally = count_test_changes(&files);
        assert_eq!(tally, TestChangeTally { added: 1, deleted: 2 });
    }
}
