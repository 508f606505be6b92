// Copyright 2026 Toolreg Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Illustrative default tool set, registered on first boot when the
//! backing store is empty (SPEC_FULL.md §6). The exact tools here are
//! not load-bearing — they only exist so a fresh install has something
//! to discover with `search_tools`/`list_tools_by_category` before any
//! real MCP servers have registered their own.

use toolreg_core::tool::Tool;

/// Builds the seed set. Dot-namespaced names (`github.create_pr`)
/// follow the convention used throughout the registry's own examples.
pub fn default_tools() -> Vec<Tool> {
    let github = [
        ("github.create_pr", "Open a pull request against a GitHub repository", &["pr", "git"][..]),
        ("github.merge_pr", "Merge an approved pull request", &["pr", "git"]),
        ("github.list_issues", "List open issues in a repository", &["issues"]),
        ("github.create_issue", "File a new issue in a repository", &["issues"]),
        ("github.comment_on_pr", "Post a review comment on a pull request", &["pr", "review"]),
        ("github.get_file_contents", "Fetch the contents of a file at a given ref", &["files"]),
        ("github.search_code", "Search code across a repository or organization", &["search"]),
        ("github.list_workflow_runs", "List recent GitHub Actions workflow runs", &["ci"]),
    ];

    let aws = [
        ("aws.s3_list_buckets", "List S3 buckets in the configured account", &["s3", "storage"][..]),
        ("aws.s3_get_object", "Download an object from an S3 bucket", &["s3", "storage"]),
        ("aws.s3_put_object", "Upload an object to an S3 bucket", &["s3", "storage"]),
        ("aws.ec2_describe_instances", "List EC2 instances and their state", &["ec2", "compute"]),
        ("aws.ec2_start_instance", "Start a stopped EC2 instance", &["ec2", "compute"]),
        ("aws.ec2_stop_instance", "Stop a running EC2 instance", &["ec2", "compute"]),
        ("aws.lambda_invoke", "Invoke a Lambda function synchronously", &["lambda", "compute"]),
        ("aws.cloudwatch_get_metrics", "Fetch a CloudWatch metric's recent data points", &["monitoring"]),
        ("aws.iam_list_roles", "List IAM roles in the account", &["iam", "security"]),
    ];

    let slack = [
        ("slack.post_message", "Post a message to a Slack channel", &["messaging"][..]),
        ("slack.list_channels", "List channels visible to the bot", &["channels"]),
        ("slack.upload_file", "Upload a file to a Slack channel", &["files", "messaging"]),
        ("slack.get_user_info", "Look up a Slack user's profile", &["users"]),
        ("slack.create_channel", "Create a new Slack channel", &["channels"]),
        ("slack.add_reaction", "Add an emoji reaction to a message", &["messaging"]),
    ];

    let mut tools = Vec::new();
    for (name, description, tags) in github {
        tools.push(seed_tool(name, description, "github", tags));
    }
    for (name, description, tags) in aws {
        tools.push(seed_tool(name, description, "aws", tags));
    }
    for (name, description, tags) in slack {
        tools.push(seed_tool(name, description, "slack", tags));
    }
    tools
}

fn seed_tool(name: &str, description: &str, category: &str, tags: &[&str]) -> Tool {
    Tool::new(name, description)
        .with_category(category)
        .with_tags(tags.iter().map(|t| t.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_set_spans_at_least_twenty_tools() {
        assert!(default_tools().len() >= 20);
    }

    #[test]
    fn seed_set_covers_the_three_categories() {
        let tools = default_tools();
        for category in ["github", "aws", "slack"] {
            assert!(tools.iter().any(|t| t.category.as_deref() == Some(category)));
        }
    }

    #[test]
    fn seed_names_are_unique() {
        let tools = default_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }
}
