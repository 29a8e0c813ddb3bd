//! Platform manifest synthesis.
//!
//! Builds the single `AndroidManifest.xml` from the project descriptor and
//! the aggregated component requirements. This is a standalone component; the
//! manifest task only wires it to the build context and writes the result.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::BuildFlags;
use crate::error::TaskError;
use crate::project::Project;
use crate::requirements::{ComponentRequirements, ConstraintValue};

/// Platform level compiled against; also the declared target.
pub(crate) const TARGET_SDK: u32 = 33;

/// Permissions tied to default-handler roles (SMS, call log, outgoing
/// calls). Companion builds never carry these unless the build explicitly
/// opted in; this is a policy gate, not component-configurable.
pub(crate) const COMPANION_BLOCKED_PERMISSIONS: &[&str] = &[
    "android.permission.RECEIVE_SMS",
    "android.permission.SEND_SMS",
    "android.permission.READ_SMS",
    "android.permission.WRITE_SMS",
    "android.permission.RECEIVE_MMS",
    "android.permission.RECEIVE_WAP_PUSH",
    "android.permission.READ_CALL_LOG",
    "android.permission.WRITE_CALL_LOG",
    "android.permission.PROCESS_OUTGOING_CALLS",
    "android.permission.ANSWER_PHONE_CALLS",
];

pub struct ManifestSynthesizer<'a> {
    project: &'a Project,
    requirements: &'a ComponentRequirements,
    flags: &'a BuildFlags,
}

impl<'a> ManifestSynthesizer<'a> {
    pub fn new(
        project: &'a Project,
        requirements: &'a ComponentRequirements,
        flags: &'a BuildFlags,
    ) -> Self {
        Self {
            project,
            requirements,
            flags,
        }
    }

    /// Produce the complete manifest document.
    pub fn synthesize(&self) -> Result<String, TaskError> {
        let project = self.project;
        let min_sdk = self.requirements.effective_min_sdk(project.min_sdk);
        let permissions = self.permissions()?;

        let mut doc = String::with_capacity(4096);
        doc.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        doc.push_str(&format!(
            "<manifest xmlns:android=\"http://schemas.android.com/apk/res/android\"\n    \
             package=\"{}\"\n    \
             android:versionCode=\"{}\"\n    \
             android:versionName=\"{}\">\n",
            escape(&project.package),
            project.version_code,
            escape(&project.version_name),
        ));

        doc.push_str(&format!(
            "  <uses-sdk android:minSdkVersion=\"{min_sdk}\" android:targetSdkVersion=\"{TARGET_SDK}\" />\n",
        ));

        let queries = self.requirements.queries();
        if !queries.is_empty() {
            doc.push_str("  <queries>\n");
            for package in queries {
                doc.push_str(&format!(
                    "    <package android:name=\"{}\" />\n",
                    escape(package)
                ));
            }
            doc.push_str("  </queries>\n");
        }

        for (permission, attributes) in &permissions {
            doc.push_str(&format!(
                "  <uses-permission android:name=\"{}\"",
                escape(permission)
            ));
            for (attribute, value) in attributes {
                doc.push_str(&format!(" android:{attribute}=\"{}\"", escape(value)));
            }
            doc.push_str(" />\n");
        }

        self.application(&mut doc);

        doc.push_str("</manifest>\n");
        Ok(doc)
    }

    fn application(&self, doc: &mut String) {
        let project = self.project;

        doc.push_str(&format!(
            "  <application\n      \
             android:label=\"{}\"\n      \
             android:icon=\"@mipmap/ic_launcher\"\n      \
             android:roundIcon=\"@mipmap/ic_launcher_round\"\n      \
             android:theme=\"@style/AppTheme\"",
            escape(&project.name),
        ));
        if self.flags.legacy_storage {
            doc.push_str("\n      android:requestLegacyExternalStorage=\"true\"");
        }
        doc.push_str(">\n");

        for screen in project.screens() {
            let main = screen == project.main_screen;
            doc.push_str(&format!(
                "    <activity android:name=\"{}.{}\" android:exported=\"{}\">\n",
                escape(&project.package),
                escape(screen),
                main,
            ));

            if main {
                doc.push_str(
                    "      <intent-filter>\n        \
                     <action android:name=\"android.intent.action.MAIN\" />\n        \
                     <category android:name=\"android.intent.category.LAUNCHER\" />\n      \
                     </intent-filter>\n",
                );

                // The companion is started from the editor through a link.
                if self.flags.companion {
                    doc.push_str(&format!(
                        "      <intent-filter>\n        \
                         <action android:name=\"android.intent.action.VIEW\" />\n        \
                         <category android:name=\"android.intent.category.DEFAULT\" />\n        \
                         <category android:name=\"android.intent.category.BROWSABLE\" />\n        \
                         <data android:scheme=\"{}\" />\n      \
                         </intent-filter>\n",
                        escape(&project.package),
                    ));
                }
            }

            doc.push_str("    </activity>\n");
        }

        for receiver in self.requirements.broadcast_receivers() {
            let (class, actions) = split_element(receiver);
            if actions.is_empty() {
                doc.push_str(&format!(
                    "    <receiver android:name=\"{}\" />\n",
                    escape(class)
                ));
            } else {
                doc.push_str(&format!(
                    "    <receiver android:name=\"{}\">\n      <intent-filter>\n",
                    escape(class)
                ));
                for action in actions {
                    doc.push_str(&format!(
                        "        <action android:name=\"{}\" />\n",
                        escape(action)
                    ));
                }
                doc.push_str("      </intent-filter>\n    </receiver>\n");
            }
        }

        for service in self.requirements.services() {
            let (class, _) = split_element(service);
            doc.push_str(&format!(
                "    <service android:name=\"{}\" />\n",
                escape(class)
            ));
        }

        for provider in self.requirements.content_providers() {
            let (class, extra) = split_element(provider);
            let authority = extra
                .first()
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("{}.{}", self.project.package, class));
            doc.push_str(&format!(
                "    <provider android:name=\"{}\" android:authorities=\"{}\" android:exported=\"false\" />\n",
                escape(class),
                escape(&authority),
            ));
        }

        for entry in self.requirements.metadata() {
            if let Some((name, value)) = entry.split_once('=') {
                doc.push_str(&format!(
                    "    <meta-data android:name=\"{}\" android:value=\"{}\" />\n",
                    escape(name),
                    escape(value),
                ));
            }
        }

        doc.push_str("  </application>\n");
    }

    /// Deduplicated permission list with reduced constraint attributes, in
    /// name order. Companion builds without the dangerous-permission opt-in
    /// have the blocked set removed after deduplication.
    fn permissions(&self) -> Result<Vec<(String, Vec<(String, String)>)>, TaskError> {
        let mut names: BTreeSet<&str> = self.requirements.permissions();

        if self.flags.companion && !self.flags.dangerous_permissions {
            for blocked in COMPANION_BLOCKED_PERMISSIONS {
                names.remove(blocked);
            }
        }

        // Group constraints by (permission, attribute), dropping constraints
        // on permissions that were stripped above.
        let mut grouped: BTreeMap<&str, BTreeMap<&str, Vec<&ConstraintValue>>> = BTreeMap::new();
        for constraint in self.requirements.constraints() {
            if !names.contains(constraint.permission.as_str()) {
                continue;
            }
            grouped
                .entry(&constraint.permission)
                .or_default()
                .entry(&constraint.attribute)
                .or_default()
                .push(&constraint.value);
        }

        names
            .into_iter()
            .map(|name| {
                let attributes = grouped
                    .get(name)
                    .map(|by_attribute| {
                        by_attribute
                            .iter()
                            .map(|(attribute, values)| {
                                reduce(attribute, values)
                                    .map(|value| (attribute.to_string(), value))
                            })
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .transpose()?
                    .unwrap_or_default();
                Ok((name.to_string(), attributes))
            })
            .collect()
    }
}

/// Combine all values declared for one `(permission, attribute)` pair into
/// the single emitted attribute value. An attribute without a reducer is a
/// configuration error and aborts the build.
fn reduce(attribute: &str, values: &[&ConstraintValue]) -> Result<String, TaskError> {
    match attribute {
        // The effective ceiling is the lowest of the declared maximums.
        "maxSdkVersion" => {
            let mut lowest = u32::MAX;
            for value in values {
                match value {
                    ConstraintValue::Number(n) => lowest = lowest.min(*n),
                    ConstraintValue::Flags(_) => {
                        return Err(TaskError::Configuration(format!(
                            "permission attribute '{attribute}' requires a numeric value"
                        )));
                    }
                }
            }
            Ok(lowest.to_string())
        }
        "usesPermissionFlags" => {
            let mut flags = BTreeSet::new();
            for value in values {
                match value {
                    ConstraintValue::Flags(set) => flags.extend(set.iter().cloned()),
                    ConstraintValue::Number(_) => {
                        return Err(TaskError::Configuration(format!(
                            "permission attribute '{attribute}' requires flag values"
                        )));
                    }
                }
            }
            Ok(flags.into_iter().collect::<Vec<_>>().join("|"))
        }
        _ => Err(TaskError::Configuration(format!(
            "unrecognized permission constraint attribute '{attribute}'"
        ))),
    }
}

/// Component element declarations arrive as `Class[,extra,...]` strings.
fn split_element(entry: &str) -> (&str, Vec<&str>) {
    let mut parts = entry.split(',').map(str::trim);
    let class = parts.next().unwrap_or_default();
    (class, parts.filter(|s| !s.is_empty()).collect())
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
