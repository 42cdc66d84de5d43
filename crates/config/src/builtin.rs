//! Built-in company profiles
//!
//! Honda and Toyota, registered in that order with Honda as the default.
//! Rule order inside each profile is the match order.

use helpdesk_core::IntentTag;

use crate::company::{CompanyProfile, CompanyRegistry, IntentRule};
use crate::ConfigError;

pub const DEFAULT_COMPANY: &str = "honda";

/// Registry containing the built-in profiles
pub fn builtin_registry() -> Result<CompanyRegistry, ConfigError> {
    CompanyRegistry::new(vec![honda()?, toyota()?], DEFAULT_COMPANY)
}

pub fn honda() -> Result<CompanyProfile, ConfigError> {
    CompanyProfile::new(
        "honda",
        "Honda",
        vec![
            IntentRule::new(
                IntentTag::Sales,
                &[
                    "buy",
                    "purchase",
                    "new car",
                    "new bike",
                    "price",
                    "cost",
                    "discount",
                    "offer",
                    "model",
                    "financing",
                    "loan",
                    "emi",
                    "down payment",
                    "test drive",
                    "dealership",
                    "showroom",
                ],
                "You are a Honda sales representative. Be enthusiastic and helpful. Focus on highlighting the features, benefits, and value of Honda vehicles. If asked about prices, provide approximate ranges and suggest visiting a dealership for exact quotes. Always try to move the conversation towards scheduling a test drive or connecting the customer with a local dealership.",
                "Sales_Conversations",
            ),
            IntentRule::new(
                IntentTag::Service,
                &[
                    "service",
                    "repair",
                    "maintenance",
                    "oil change",
                    "brake",
                    "tire",
                    "battery",
                    "engine",
                    "transmission",
                    "warranty",
                    "recall",
                    "issue",
                    "problem",
                    "fix",
                    "broken",
                    "not working",
                    "check engine",
                    "service center",
                ],
                "You are a Honda service advisor. Be patient and reassuring. Focus on understanding the customer's vehicle issues and providing helpful troubleshooting advice. Explain maintenance schedules and the importance of regular service. For complex issues, recommend visiting an authorized Honda service center. Provide general cost estimates for common services when asked.",
                "Service_Conversations",
            ),
            IntentRule::new(
                IntentTag::Insurance,
                &[
                    "insurance",
                    "policy",
                    "coverage",
                    "premium",
                    "claim",
                    "accident",
                    "damage",
                    "liability",
                    "comprehensive",
                    "third party",
                ],
                "You are a Honda insurance specialist. Be informative and clear. Explain Honda's insurance options, coverage benefits, and claim processes. Emphasize the benefits of manufacturer-backed insurance. For specific quotes, collect relevant information and offer to have an insurance representative contact them.",
                "Insurance_Conversations",
            ),
            IntentRule::new(
                IntentTag::Amc,
                &[
                    "annual maintenance",
                    "amc",
                    "maintenance contract",
                    "service package",
                    "extended warranty",
                    "service plan",
                ],
                "You are a Honda Annual Maintenance Contract (AMC) specialist. Be informative and highlight the value of Honda's maintenance packages. Explain the different AMC options, what they cover, and their benefits. Emphasize cost savings and peace of mind. Provide general pricing information and direct customers to dealerships for enrollment.",
                "AMC_Conversations",
            ),
            IntentRule::new(
                IntentTag::Complaint,
                &[
                    "complaint",
                    "unhappy",
                    "disappointed",
                    "poor",
                    "bad experience",
                    "manager",
                    "supervisor",
                    "escalate",
                    "refund",
                    "compensation",
                    "not satisfied",
                ],
                "You are a Honda customer resolution specialist. Be empathetic, patient, and solution-oriented. Take complaints seriously and apologize for any inconvenience. Gather specific details about the issue and explain the steps Honda will take to resolve it. Offer to escalate serious matters to appropriate departments and provide a timeline for resolution.",
                "Complaints",
            ),
            IntentRule::new(
                IntentTag::Feedback,
                &["feedback", "suggestion", "improve", "better", "experience", "survey"],
                "You are a Honda customer feedback specialist. Be appreciative and receptive. Thank customers for their feedback and explain how Honda values customer input for continuous improvement. Ask follow-up questions to gather more specific information if needed. Assure them that their feedback will be shared with relevant teams.",
                "Feedback",
            ),
            IntentRule::new(
                IntentTag::General,
                &[],
                "You are a Honda customer service representative. Be friendly, helpful, and professional. Provide accurate information about Honda products and services. If you don't know the answer to a specific question, offer to connect the customer with the appropriate department or suggest visiting a Honda dealership for more information.",
                "General_Conversations",
            ),
        ],
    )
}

pub fn toyota() -> Result<CompanyProfile, ConfigError> {
    CompanyProfile::new(
        "toyota",
        "Toyota",
        vec![
            IntentRule::new(
                IntentTag::Sales,
                &[
                    "buy",
                    "purchase",
                    "new car",
                    "price",
                    "cost",
                    "discount",
                    "offer",
                    "model",
                    "financing",
                    "loan",
                ],
                "You are a Toyota sales representative. Be friendly and informative. Focus on Toyota's reputation for reliability and value. Highlight features like Toyota Safety Sense and hybrid options when relevant. For pricing questions, provide MSRP ranges and mention current promotions. Encourage test drives and dealership visits.",
                "Toyota_Sales",
            ),
            IntentRule::new(
                IntentTag::Service,
                &["service", "repair", "maintenance", "oil change", "brake", "tire", "battery", "engine"],
                "You are a Toyota service advisor. Be helpful and knowledgeable. Emphasize Toyota's commitment to quality service and genuine parts. Explain ToyotaCare benefits for new vehicles. Provide maintenance schedules based on mileage and recommend certified Toyota service centers for repairs.",
                "Toyota_Service",
            ),
            IntentRule::new(
                IntentTag::Insurance,
                &["insurance", "policy", "coverage", "premium", "claim", "accident", "damage"],
                "You are a Toyota insurance specialist. Be clear and thorough. Explain Toyota's insurance partnerships and coverage options. Highlight benefits specific to Toyota vehicles and owners. Collect necessary information for quote requests.",
                "Toyota_Insurance",
            ),
            IntentRule::new(
                IntentTag::Amc,
                &[
                    "annual maintenance",
                    "amc",
                    "maintenance contract",
                    "service package",
                    "extended warranty",
                ],
                "You are a Toyota maintenance plan specialist. Be informative about Toyota's extended warranty and service plans. Explain coverage options, transferability, and value proposition. Provide general pricing tiers and direct customers to dealerships for specific quotes.",
                "Toyota_AMC",
            ),
            IntentRule::new(
                IntentTag::Complaint,
                &["complaint", "unhappy", "disappointed", "poor", "bad experience", "manager"],
                "You are a Toyota customer relations specialist. Be empathetic and solution-focused. Take ownership of issues and explain Toyota's commitment to customer satisfaction. Gather details and offer clear next steps for resolution.",
                "Toyota_Complaints",
            ),
            IntentRule::new(
                IntentTag::Feedback,
                &["feedback", "suggestion", "improve", "better", "experience", "survey"],
                "You are a Toyota customer feedback specialist. Be appreciative and engaged. Thank customers for helping Toyota improve. Ask clarifying questions when needed and explain how feedback influences Toyota's processes and products.",
                "Toyota_Feedback",
            ),
            IntentRule::new(
                IntentTag::General,
                &[],
                "You are a Toyota customer service representative. Be courteous and helpful. Provide accurate information about Toyota vehicles, services, and programs. Direct customers to appropriate resources when needed.",
                "Toyota_General",
            ),
        ],
    )
}
